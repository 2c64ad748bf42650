use std::time::Duration;

use super::{InitCtx, ellipsize, update};
use crate::{
    sampler::{Probe, Sampler, run_command},
    surface::{Handle, Input, MouseButton, Surface},
    utils::{ReloadTx, ResultExt as _, spawn_action},
};

const MAX_TITLE_CHARS: usize = 40;
const MAX_ARTIST_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerState {
    pub status: PlayerStatus,
    pub title: String,
    pub artist: String,
    pub position: Duration,
    pub duration: Duration,
}

/// Raw `playerctl` output. Anything that failed is `None`.
#[derive(Debug, Default)]
pub struct PlayerRaw {
    pub status: Option<String>,
    pub metadata: Option<String>,
    pub position: Option<String>,
    pub length: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerProbe;
impl Probe for PlayerProbe {
    type Raw = PlayerRaw;
    async fn read(&mut self) -> anyhow::Result<PlayerRaw> {
        // No player running makes `status` fail, which just means stopped.
        let Some(status) = run_command("playerctl", ["status"]).await.ok_or_debug() else {
            return Ok(PlayerRaw::default());
        };
        let (metadata, position, length) = futures::future::join3(
            run_command("playerctl", ["metadata", "--format", "{{title}}|{{artist}}"]),
            run_command("playerctl", ["position"]),
            run_command("playerctl", ["metadata", "mpris:length"]),
        )
        .await;
        Ok(PlayerRaw {
            status: Some(status),
            metadata: metadata.ok_or_debug(),
            position: position.ok_or_debug(),
            length: length.ok_or_debug(),
        })
    }
}

/// Never fails. Missing fields fall back to their defaults.
pub fn parse_player(raw: PlayerRaw) -> anyhow::Result<PlayerState> {
    let status = match raw.status.as_deref().map(str::trim) {
        Some("Playing") => PlayerStatus::Playing,
        Some("Paused") => PlayerStatus::Paused,
        _ => return Ok(PlayerState::default()),
    };
    let (title, artist) = raw
        .metadata
        .as_deref()
        .map(str::trim)
        .and_then(|meta| meta.split_once('|'))
        .unwrap_or_default();
    let position = raw
        .position
        .and_then(|pos| pos.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_default();
    let duration = raw
        .length
        .and_then(|len| len.trim().parse::<u64>().ok())
        .map(Duration::from_micros)
        .unwrap_or_default();

    Ok(PlayerState {
        status,
        title: title.to_owned(),
        artist: artist.to_owned(),
        position,
        duration,
    })
}

pub fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn render_player(state: &PlayerState) -> String {
    let marker = match state.status {
        PlayerStatus::Stopped => return "No media playing".into(),
        PlayerStatus::Playing => "",
        PlayerStatus::Paused => "⏸ ",
    };
    format!(
        "{marker}{} - {} [{}/{}]",
        ellipsize(&state.artist, MAX_ARTIST_CHARS),
        ellipsize(&state.title, MAX_TITLE_CHARS),
        format_mmss(state.position),
        format_mmss(state.duration),
    )
}

pub struct Player {
    pub handle: Handle,
    reload_tx: ReloadTx,
    state: PlayerState,
}

impl Player {
    pub fn initialize(
        handle: Handle,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
    ) -> Self {
        let this = Self::new(handle, surface);
        ctx.tasks.push(
            Sampler::new("player", Duration::from_secs(1), PlayerProbe, parse_player)
                .reload_on(this.reload_tx.subscribe())
                .spawn(ctx.ui_tx.clone(), move |sample| {
                    Some(update(slot, move |w: &mut Player, s| {
                        w.set_state(s, sample.value)
                    }))
                }),
        );
        this
    }

    pub fn new(handle: Handle, surface: &mut dyn Surface) -> Self {
        let state = PlayerState::default();
        surface.set_text(handle, &render_player(&state));
        Self {
            handle,
            reload_tx: ReloadTx::new(),
            state,
        }
    }

    pub fn set_state(&mut self, surface: &mut dyn Surface, state: PlayerState) {
        if state != self.state {
            let text = render_player(&state);
            if text != render_player(&self.state) {
                surface.set_text(self.handle, &text);
            }
            self.state = state;
        }
    }

    pub fn on_input(&mut self, input: Input) {
        if input != Input::Click(MouseButton::Left) {
            return;
        }
        let reload_tx = self.reload_tx.clone();
        spawn_action("play-pause", async move {
            run_command("playerctl", ["play-pause"]).await?;
            reload_tx.reload();
            Ok(())
        });
    }

    pub fn reload(&self) {
        self.reload_tx.reload();
    }
}
