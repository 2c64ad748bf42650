use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;

use super::{InitCtx, update};
use crate::{
    sampler::{Counter, Probe, Sampler},
    surface::{Handle, Surface},
    utils::ReloadTx,
};

const VIRTUAL_PREFIXES: &[&str] = &["tun", "docker", "veth", "br-", "virbr"];

/// Auto-detection found no interface that is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoActiveInterface;
impl std::fmt::Display for NoActiveInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("no active network interface")
    }
}
impl std::error::Error for NoActiveInterface {}

/// Byte counters of one interface. Counters of different interfaces have no rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetCounters {
    pub iface: String,
    pub rx: u64,
    pub tx: u64,
}
impl Counter for NetCounters {
    /// Bytes per second, received and transmitted.
    type Rate = (f64, f64);
    fn rate_since(&self, previous: &Self, elapsed_secs: f64) -> Option<(f64, f64)> {
        if self.iface != previous.iface {
            return None;
        }
        Some((
            self.rx.rate_since(&previous.rx, elapsed_secs)?,
            self.tx.rate_since(&previous.tx, elapsed_secs)?,
        ))
    }
}

#[derive(Debug)]
pub struct NetRaw {
    pub iface: String,
    pub dev: String,
}

/// Reads `/proc/net/dev` and picks the interface to report on.
#[derive(Debug, Clone)]
pub struct NetProbe {
    fixed: Option<String>,
    current: Option<String>,
    proc_net_dev: PathBuf,
    sys_class_net: PathBuf,
}

impl NetProbe {
    pub fn new(fixed: Option<String>) -> Self {
        Self::with_paths(fixed, "/proc/net/dev", "/sys/class/net")
    }

    pub fn with_paths(
        fixed: Option<String>,
        proc_net_dev: impl Into<PathBuf>,
        sys_class_net: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fixed,
            current: None,
            proc_net_dev: proc_net_dev.into(),
            sys_class_net: sys_class_net.into(),
        }
    }
}

impl Probe for NetProbe {
    type Raw = NetRaw;
    async fn read(&mut self) -> anyhow::Result<NetRaw> {
        let dev = tokio::fs::read_to_string(&self.proc_net_dev)
            .await
            .with_context(|| format!("Failed to read {}", self.proc_net_dev.display()))?;

        let still_present = |name: &&String| interfaces(&dev).any(|it| it == name.as_str());
        let iface = if let Some(fixed) = &self.fixed {
            fixed.clone()
        } else if let Some(current) = self.current.as_ref().filter(still_present) {
            current.clone()
        } else {
            if let Some(previous) = self.current.take() {
                log::info!("Interface {previous} is gone, detecting again");
            }
            let found = detect_interface(&dev, &self.sys_class_net)
                .await
                .ok_or(NoActiveInterface)?;
            log::info!("Using network interface {found}");
            self.current = Some(found.clone());
            found
        };
        Ok(NetRaw { iface, dev })
    }
}

fn interfaces(dev: &str) -> impl Iterator<Item = &str> {
    dev.lines()
        .filter_map(|line| Some(line.split_once(':')?.0.trim()))
}

/// The first interface in table order that is up and not loopback or virtual.
pub async fn detect_interface(dev: &str, sys_class_net: &Path) -> Option<String> {
    for name in interfaces(dev) {
        if name == "lo" || VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
            continue;
        }
        let operstate = sys_class_net.join(name).join("operstate");
        match tokio::fs::read_to_string(&operstate).await {
            Ok(state) if state.trim() == "up" => return Some(name.to_owned()),
            Ok(_) => {}
            Err(err) => log::trace!("Failed to read {}: {err}", operstate.display()),
        }
    }
    None
}

pub fn parse_net(NetRaw { iface, dev }: NetRaw) -> anyhow::Result<NetCounters> {
    let fields: Vec<_> = dev
        .lines()
        .find_map(|line| {
            let (name, rest) = line.split_once(':')?;
            (name.trim() == iface).then_some(rest)
        })
        .with_context(|| format!("Interface {iface} not in /proc/net/dev"))?
        .split_whitespace()
        .collect();
    let [rx, _, _, _, _, _, _, _, tx, ..] = fields[..] else {
        anyhow::bail!("Malformed /proc/net/dev line for {iface}");
    };
    Ok(NetCounters {
        rx: rx.parse().context("Bad rx bytes")?,
        tx: tx.parse().context("Bad tx bytes")?,
        iface,
    })
}

pub struct Network {
    pub handle: Handle,
    reload_tx: ReloadTx,
    connected: bool,
}

impl Network {
    pub fn initialize(
        handle: Handle,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
    ) -> Self {
        let this = Self::new(handle, surface);
        let sampler = Sampler::new(
            "network",
            Duration::from_secs(1),
            NetProbe::new(ctx.config.net_iface.clone()),
            parse_net,
        )
        .reload_on(this.reload_tx.subscribe())
        .on_error(move |err| {
            err.downcast_ref::<NoActiveInterface>()?;
            Some(update(slot, |w: &mut Network, s| w.set_disconnected(s)))
        });
        ctx.tasks
            .push(sampler.spawn(ctx.ui_tx.clone(), move |sample| {
                let rate = sample.rate();
                Some(update(slot, move |w: &mut Network, s| match rate {
                    Some((rx, tx)) => w.set_rate(s, rx, tx),
                    None => w.set_connected(s),
                }))
            }));
        this
    }

    pub fn new(handle: Handle, surface: &mut dyn Surface) -> Self {
        let this = Self {
            handle,
            reload_tx: ReloadTx::new(),
            connected: true,
        };
        this.placeholder(surface);
        this
    }

    fn placeholder(&self, surface: &mut dyn Surface) {
        surface.set_text(self.handle, "↓—KB/s ↑—KB/s");
    }

    pub fn set_rate(&mut self, surface: &mut dyn Surface, rx: f64, tx: f64) {
        self.set_connected(surface);
        surface.set_text(
            self.handle,
            &format!("↓{:.1}KB/s ↑{:.1}KB/s", rx / 1024.0, tx / 1024.0),
        );
    }

    /// Counters arrived but there is no rate yet.
    pub fn set_connected(&mut self, surface: &mut dyn Surface) {
        if !self.connected {
            self.connected = true;
            surface.set_classes(self.handle, &[]);
            self.placeholder(surface);
        }
    }

    pub fn set_disconnected(&mut self, surface: &mut dyn Surface) {
        if self.connected {
            self.connected = false;
            surface.set_classes(self.handle, &["disconnected"]);
            surface.set_text(self.handle, "NET: no active interface");
        }
    }

    pub fn reload(&self) {
        self.reload_tx.reload();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::surface::{Section, Slot, testing::RecordingSurface};

    const DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
docker0:   3000      30    0    0    0     0          0         0     3000      30    0    0    0     0       0          0
 wlan0:    5000      50    0    0    0     0          0         0     7000      70    0    0    0     0       0          0
  eth0:    9000      90    0    0    0     0          0         0    11000     110    0    0    0     0       0          0
";

    fn sys_dir(states: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (iface, state) in states {
            std::fs::create_dir(dir.path().join(iface)).unwrap();
            std::fs::write(dir.path().join(iface).join("operstate"), format!("{state}\n")).unwrap();
        }
        dir
    }

    #[test]
    fn parses_exact_interface_columns() {
        let counters = parse_net(NetRaw {
            iface: "eth0".into(),
            dev: DEV.into(),
        })
        .unwrap();
        assert_eq!((counters.rx, counters.tx), (9000, 11000));

        assert!(
            parse_net(NetRaw {
                iface: "eth".into(),
                dev: DEV.into(),
            })
            .is_err()
        );
    }

    #[tokio::test]
    async fn detection_skips_loopback_virtual_and_down() {
        let sys = sys_dir(&[
            ("lo", "unknown"),
            ("docker0", "up"),
            ("wlan0", "down"),
            ("eth0", "up"),
        ]);
        assert_eq!(detect_interface(DEV, sys.path()).await.as_deref(), Some("eth0"));

        let sys = sys_dir(&[("docker0", "up"), ("wlan0", "down")]);
        assert_eq!(detect_interface(DEV, sys.path()).await, None);
    }

    #[tokio::test]
    async fn missing_interface_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("dev");
        std::fs::write(&dev, DEV).unwrap();
        let sys = sys_dir(&[]);

        let mut sampler = Sampler::<_, _, ()>::new(
            "network",
            Duration::from_secs(1),
            NetProbe::with_paths(None, &dev, sys.path()),
            parse_net,
        );
        let err = sampler.tick(Instant::now()).await.unwrap_err();
        assert!(err.downcast_ref::<NoActiveInterface>().is_some(), "{err:#}");
    }

    #[tokio::test]
    async fn vanished_interface_is_detected_again() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("dev");
        std::fs::write(&dev, DEV).unwrap();
        let sys = sys_dir(&[("wlan0", "up"), ("eth0", "up")]);

        let mut sampler = Sampler::<_, _, ()>::new(
            "network",
            Duration::from_secs(1),
            NetProbe::with_paths(None, &dev, sys.path()),
            parse_net,
        );
        let t0 = Instant::now();
        let first = sampler.tick(t0).await.unwrap();
        assert_eq!(first.value.iface, "wlan0");

        std::fs::write(&dev, DEV.replace("wlan0", "wlan9")).unwrap();
        let second = sampler.tick(t0 + Duration::from_secs(1)).await.unwrap();
        assert_eq!(second.value.iface, "eth0");
        assert_eq!(second.rate(), None);

        let third = sampler.tick(t0 + Duration::from_secs(2)).await.unwrap();
        assert_eq!(third.rate(), Some((0.0, 0.0)));
    }

    #[test]
    fn disconnected_and_back() {
        let mut surface = RecordingSurface::default();
        let handle = surface.add(Slot::Section(Section::Right));
        let mut net = Network::new(handle, &mut surface);

        net.set_disconnected(&mut surface);
        assert_eq!(surface.text(handle).as_deref(), Some("NET: no active interface"));
        assert_eq!(surface.classes(handle), ["disconnected"]);

        net.set_rate(&mut surface, 2048.0, 512.0);
        assert_eq!(surface.text(handle).as_deref(), Some("↓2.0KB/s ↑0.5KB/s"));
        assert!(surface.classes(handle).is_empty());
    }
}
