use std::{ffi::OsString, time::Duration};

use anyhow::Context as _;

use super::{InitCtx, update};
use crate::{
    sampler::{CommandProbe, Probe, Sampler},
    surface::{Handle, Surface},
    utils::ReloadTx,
};

/// A percentage read from a system tool: CPU, memory or disk usage.
pub struct SystemStat {
    pub handle: Handle,
    icon: &'static str,
    reload_tx: ReloadTx,
    percent: Option<f64>,
}

impl SystemStat {
    pub fn cpu(handle: Handle, slot: usize, surface: &mut dyn Surface, ctx: &mut InitCtx) -> Self {
        Self::start(
            handle,
            slot,
            surface,
            ctx,
            Sampler::new(
                "cpu",
                Duration::from_secs(2),
                CommandProbe::new("top", ["-bn1"]),
                |raw: String| parse_cpu(&raw),
            ),
            "💻",
        )
    }

    pub fn memory(
        handle: Handle,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
    ) -> Self {
        Self::start(
            handle,
            slot,
            surface,
            ctx,
            Sampler::new(
                "memory",
                Duration::from_secs(2),
                CommandProbe::new("free", std::iter::empty::<OsString>()),
                |raw: String| parse_memory(&raw),
            ),
            "🧠",
        )
    }

    pub fn disk(handle: Handle, slot: usize, surface: &mut dyn Surface, ctx: &mut InitCtx) -> Self {
        let path = ctx.config.disk_path.clone().into_os_string();
        Self::start(
            handle,
            slot,
            surface,
            ctx,
            Sampler::new(
                "disk",
                Duration::from_secs(30),
                CommandProbe::new("df", [OsString::from("-P"), path]),
                |raw: String| parse_disk(&raw),
            ),
            "💾",
        )
    }

    fn start<P: Probe>(
        handle: Handle,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
        sampler: Sampler<P, f64, super::Bar>,
        icon: &'static str,
    ) -> Self {
        let this = Self::new(handle, icon, surface);
        ctx.tasks.push(
            sampler
                .reload_on(this.reload_tx.subscribe())
                .spawn(ctx.ui_tx.clone(), move |sample| {
                    Some(update(slot, move |w: &mut SystemStat, s| {
                        w.set_percent(s, sample.value)
                    }))
                }),
        );
        this
    }

    pub fn new(handle: Handle, icon: &'static str, surface: &mut dyn Surface) -> Self {
        surface.set_text(handle, &format!("{icon} —%"));
        Self {
            handle,
            icon,
            reload_tx: ReloadTx::new(),
            percent: None,
        }
    }

    pub fn set_percent(&mut self, surface: &mut dyn Surface, percent: f64) {
        self.percent = Some(percent);
        surface.set_text(self.handle, &format!("{} {percent:.1}%", self.icon));
    }

    #[cfg(test)]
    pub fn percent(&self) -> Option<f64> {
        self.percent
    }

    pub fn reload(&self) {
        self.reload_tx.reload();
    }
}

fn parse_percent(s: &str) -> anyhow::Result<f64> {
    let s = s.trim().trim_end_matches('%');
    s.parse()
        .with_context(|| format!("Not a number: {s:?}"))
}

/// Reads the `Cpu(s)` summary line of `top -bn1`, e.g.
/// `%Cpu(s):  3.1 us,  1.0 sy,  0.0 ni, 95.5 id, ...`.
pub fn parse_cpu(raw: &str) -> anyhow::Result<f64> {
    let line = raw
        .lines()
        .find(|line| line.contains("Cpu(s)"))
        .context("No Cpu(s) line")?;
    let (_, fields) = line.split_once(':').context("Malformed Cpu(s) line")?;

    let mut first = None;
    for field in fields.split(',') {
        let field = field.trim();
        let split = field
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(field.len());
        let (value, key) = field.split_at(split);
        let value = parse_percent(value)?;
        if key.trim() == "id" {
            return Ok((100.0 - value).clamp(0.0, 100.0));
        }
        first.get_or_insert(value);
    }
    first.context("Empty Cpu(s) line")
}

/// Used over total from the `Mem:` line of `free`.
pub fn parse_memory(raw: &str) -> anyhow::Result<f64> {
    let fields: Vec<_> = raw
        .lines()
        .find(|line| line.starts_with("Mem:"))
        .context("No Mem: line")?
        .split_whitespace()
        .collect();
    let [_, total, used, ..] = fields[..] else {
        anyhow::bail!("Malformed Mem: line {fields:?}");
    };
    let total: f64 = total.parse().context("Bad total memory")?;
    let used: f64 = used.parse().context("Bad used memory")?;
    if total <= 0.0 {
        anyhow::bail!("Total memory is zero");
    }
    Ok(used / total * 100.0)
}

/// The capacity column of `df -P`.
pub fn parse_disk(raw: &str) -> anyhow::Result<f64> {
    let line = raw
        .lines()
        .rfind(|line| !line.trim().is_empty())
        .context("Empty df output")?;
    let capacity = line
        .split_whitespace()
        .nth(4)
        .with_context(|| format!("Malformed df line {line:?}"))?;
    parse_percent(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Section, Slot, testing::RecordingSurface};

    #[test]
    fn cpu_from_idle() {
        let raw = "top - 10:00:00 up 1 day,  2 users,  load average: 0.50, 0.40, 0.30\n\
                   Tasks: 300 total,   1 running\n\
                   %Cpu(s):  3.1 us,  1.0 sy,  0.0 ni, 95.5 id,  0.4 wa,  0.0 hi,  0.0 si,  0.0 st\n\
                   MiB Mem :  15890.2 total\n";
        let usage = parse_cpu(raw).unwrap();
        assert!((usage - 4.5).abs() < 1e-9, "{usage}");
    }

    #[test]
    fn cpu_old_format_and_missing_idle() {
        let old = "Cpu(s):  2.0%us,  1.0%sy,  0.0%ni, 96.0%id\n";
        assert!((parse_cpu(old).unwrap() - 4.0).abs() < 1e-9);

        let no_idle = "%Cpu(s): 12.5 us,  3.0 sy\n";
        assert_eq!(parse_cpu(no_idle).unwrap(), 12.5);

        assert!(parse_cpu("nothing here").is_err());
        assert!(parse_cpu("%Cpu(s): n/a us").is_err());
    }

    #[test]
    fn memory_ratio() {
        let raw = "               total        used        free      shared  buff/cache   available\n\
                   Mem:        16000000     4000000     8000000      100000     4000000    11000000\n\
                   Swap:        2000000           0     2000000\n";
        assert_eq!(parse_memory(raw).unwrap(), 25.0);
        assert!(parse_memory("Mem: 0 0 0").is_err());
        assert!(parse_memory("Swap: 1 2 3").is_err());
    }

    #[test]
    fn disk_capacity() {
        let raw = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
                   /dev/nvme0n1p2   480000000 201600000 278400000      42% /\n";
        assert_eq!(parse_disk(raw).unwrap(), 42.0);
        assert!(parse_disk("").is_err());
        assert!(parse_disk("Filesystem 1024-blocks").is_err());
    }

    #[test]
    fn placeholder_then_value() {
        let mut surface = RecordingSurface::default();
        let handle = surface.add(Slot::Section(Section::Right));
        let mut stat = SystemStat::new(handle, "💾", &mut surface);
        assert_eq!(surface.text(handle).as_deref(), Some("💾 —%"));
        assert_eq!(stat.percent(), None);

        stat.set_percent(&mut surface, 42.0);
        assert_eq!(surface.text(handle).as_deref(), Some("💾 42.0%"));
    }
}
