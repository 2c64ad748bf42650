use std::time::Duration;

use anyhow::Context as _;

use super::{InitCtx, update};
use crate::{
    sampler::{Probe, Sampler, run_command},
    surface::{Handle, Input, MouseButton, Surface},
    utils::{ReloadTx, spawn_action},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeState {
    pub percent: u32,
    pub muted: bool,
}
impl VolumeState {
    pub fn icon(self) -> &'static str {
        match self.percent {
            _ if self.muted => "🔇",
            0 => "🔈",
            1..50 => "🔉",
            _ => "🔊",
        }
    }
}

/// `pactl get-sink-volume` and `get-sink-mute` output, in that order.
#[derive(Debug, Clone)]
pub struct VolumeProbe {
    sink: String,
}
impl Probe for VolumeProbe {
    type Raw = (String, String);
    async fn read(&mut self) -> anyhow::Result<(String, String)> {
        futures::future::try_join(
            run_command("pactl", ["get-sink-volume", self.sink.as_str()]),
            run_command("pactl", ["get-sink-mute", self.sink.as_str()]),
        )
        .await
    }
}

pub fn parse_volume((volume, mute): (String, String)) -> anyhow::Result<VolumeState> {
    let percent = volume
        .lines()
        .filter(|line| line.contains("Volume:"))
        .find_map(|line| line.split_whitespace().nth(4))
        .context("No volume in pactl output")?;
    let percent = percent.trim_end_matches('%');
    Ok(VolumeState {
        percent: percent
            .parse()
            .with_context(|| format!("Bad volume {percent:?}"))?,
        muted: mute.contains("yes"),
    })
}

/// The `pactl` arguments an input maps to.
pub fn volume_action(sink: &str, input: Input) -> Option<Vec<String>> {
    let (cmd, arg) = match input {
        Input::Click(MouseButton::Left) => ("set-sink-mute", "toggle"),
        Input::Click(MouseButton::Right) => ("set-sink-volume", "100%"),
        Input::ScrollUp => ("set-sink-volume", "+5%"),
        Input::ScrollDown => ("set-sink-volume", "-5%"),
        Input::Click(MouseButton::Middle) => return None,
    };
    // "--" keeps "-5%" from being read as an option.
    Some(Vec::from(["--", cmd, sink, arg].map(String::from)))
}

pub struct Volume {
    pub handle: Handle,
    sink: String,
    reload_tx: ReloadTx,
    state: Option<VolumeState>,
}

impl Volume {
    pub fn initialize(
        handle: Handle,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
    ) -> Self {
        let this = Self::new(handle, ctx.config.sink.clone(), surface);
        ctx.tasks.push(
            Sampler::new(
                "volume",
                Duration::from_secs(1),
                VolumeProbe {
                    sink: this.sink.clone(),
                },
                parse_volume,
            )
            .reload_on(this.reload_tx.subscribe())
            .spawn(ctx.ui_tx.clone(), move |sample| {
                Some(update(slot, move |w: &mut Volume, s| {
                    w.set_state(s, sample.value)
                }))
            }),
        );
        this
    }

    pub fn new(handle: Handle, sink: String, surface: &mut dyn Surface) -> Self {
        surface.set_text(handle, "🔊 —%");
        Self {
            handle,
            sink,
            reload_tx: ReloadTx::new(),
            state: None,
        }
    }

    pub fn set_state(&mut self, surface: &mut dyn Surface, state: VolumeState) {
        if self.state == Some(state) {
            return;
        }
        if self.state.map(|it| it.muted) != Some(state.muted) {
            let classes: &[&str] = if state.muted { &["muted"] } else { &[] };
            surface.set_classes(self.handle, classes);
        }
        surface.set_text(self.handle, &format!("{} {}%", state.icon(), state.percent));
        self.state = Some(state);
    }

    pub fn on_input(&mut self, input: Input) {
        let Some(args) = volume_action(&self.sink, input) else {
            return;
        };
        let reload_tx = self.reload_tx.clone();
        spawn_action("volume", async move {
            run_command("pactl", &args).await?;
            reload_tx.reload();
            Ok(())
        });
    }

    pub fn reload(&self) {
        self.reload_tx.reload();
    }
}
