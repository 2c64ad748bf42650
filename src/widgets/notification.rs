use std::time::Duration;

use anyhow::Context as _;

use super::{InitCtx, update};
use crate::{
    sampler::{CommandProbe, Sampler, run_command},
    surface::{Handle, Input, MouseButton, Surface},
    utils::{ReloadTx, spawn_action},
};

pub fn parse_count(raw: String) -> anyhow::Result<u32> {
    let raw = raw.trim();
    raw.parse()
        .with_context(|| format!("Bad notification count {raw:?}"))
}

pub fn render_count(count: u32) -> String {
    match count {
        0 => "🔔".into(),
        n => format!("🔔 {n}"),
    }
}

pub struct Notification {
    pub handle: Handle,
    reload_tx: ReloadTx,
    count: Option<u32>,
}

impl Notification {
    pub fn initialize(
        handle: Handle,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
    ) -> Self {
        let this = Self::new(handle, surface);
        ctx.tasks.push(
            Sampler::new(
                "notification",
                Duration::from_secs(2),
                CommandProbe::new("swaync-client", ["-c"]),
                parse_count,
            )
            .reload_on(this.reload_tx.subscribe())
            .spawn(ctx.ui_tx.clone(), move |sample| {
                Some(update(slot, move |w: &mut Notification, s| {
                    w.set_count(s, sample.value)
                }))
            }),
        );
        this
    }

    pub fn new(handle: Handle, surface: &mut dyn Surface) -> Self {
        surface.set_text(handle, &render_count(0));
        Self {
            handle,
            reload_tx: ReloadTx::new(),
            count: None,
        }
    }

    pub fn set_count(&mut self, surface: &mut dyn Surface, count: u32) {
        if self.count != Some(count) {
            surface.set_text(self.handle, &render_count(count));
            self.count = Some(count);
        }
    }

    pub fn on_input(&mut self, input: Input) {
        if input != Input::Click(MouseButton::Left) {
            return;
        }
        let reload_tx = self.reload_tx.clone();
        spawn_action("toggle notification center", async move {
            run_command("swaync-client", ["-t"]).await?;
            reload_tx.reload();
            Ok(())
        });
    }

    pub fn reload(&self) {
        self.reload_tx.reload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Section, Slot, testing::RecordingSurface};

    #[test]
    fn count_text() {
        assert_eq!(parse_count("3\n".into()).unwrap(), 3);
        assert!(parse_count("".into()).is_err());
        assert_eq!(render_count(0), "🔔");
        assert_eq!(render_count(12), "🔔 12");
    }

    #[test]
    fn set_count_only_writes_changes() {
        let mut surface = RecordingSurface::default();
        let handle = surface.add(Slot::Section(Section::Right));
        let mut notification = Notification::new(handle, &mut surface);
        surface.take_ops();

        notification.set_count(&mut surface, 2);
        notification.set_count(&mut surface, 2);
        assert_eq!(surface.take_ops().len(), 1);
        assert_eq!(surface.text(handle).as_deref(), Some("🔔 2"));
    }
}
