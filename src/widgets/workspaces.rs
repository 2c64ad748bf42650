use std::time::Duration;

use tokio_stream::{StreamExt as _, wrappers::IntervalStream};
use tokio_util::task::AbortOnDropHandle;

use super::{Bar, InitCtx, update};
use crate::{
    compositor::{
        CompositorEvent, HyprQuery, Monitor, Snapshot, SnapshotSource, Workspace, event_kind,
        mark_active, switch_workspace,
    },
    dispatch::UiTx,
    reconcile::Reconciler,
    surface::{Handle, Input, MouseButton, Surface},
    utils::{ReloadRx, ReloadTx, ResultExt as _, UnbRx, spawn_action},
};

/// Cached compositor state, owned by the presentation thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DesktopState {
    pub workspaces: Vec<Workspace>,
    pub monitors: Vec<Monitor>,
    pub active_monitor: Option<String>,
    pub active_workspace: Option<String>,
}

impl DesktopState {
    /// Replaces the cache. A snapshot taken while no monitor is focused keeps the
    /// previously known active monitor.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        if let Some(mon) = snapshot.focused_monitor() {
            self.active_monitor = Some(mon.name.clone());
            self.active_workspace = Some(mon.active_workspace_id.to_string());
        }
        let Snapshot {
            workspaces,
            monitors,
        } = snapshot;
        self.workspaces = workspaces;
        self.monitors = monitors;
    }

    /// Applies a `focusedmon` payload (`MONITOR,WORKSPACE`) to the cache. The focused
    /// monitor is looked up by name, then by treating the second field as a monitor id.
    pub fn focus_monitor(&mut self, payload: &str) {
        let (monitor, token) = match payload.split_once(',') {
            Some((monitor, token)) => (monitor.trim(), Some(token.trim())),
            None => (payload.trim(), None),
        };

        let by_name = self.monitors.iter().find(|mon| mon.name == monitor);
        let by_id = || {
            let id = token?.parse::<i64>().ok()?;
            self.monitors.iter().find(|mon| mon.id == id)
        };
        let active_workspace = by_name
            .or_else(by_id)
            .map(|mon| mon.active_workspace_id.to_string())
            .or_else(|| token.map(str::to_owned));

        for mon in &mut self.monitors {
            mon.is_active = mon.name == monitor;
        }
        self.active_monitor = Some(monitor.to_owned());

        if let Some(active) = &active_workspace
            && self.workspaces.iter().any(|ws| ws.id.to_string() == *active)
        {
            mark_active(&mut self.workspaces, |ws| ws.id.to_string() == *active);
        }
        self.active_workspace = active_workspace;
    }
}

pub struct Workspaces {
    state: DesktopState,
    reconciler: Reconciler,
    reload_tx: ReloadTx,
}

impl Workspaces {
    pub fn initialize(container: Handle, slot: usize, ctx: &mut InitCtx) -> Self {
        let this = Self::new(container);
        let events = ctx.listener.subscribe(&[
            event_kind::WORKSPACE,
            event_kind::FOCUSED_MONITOR,
            event_kind::CREATE_WORKSPACE,
            event_kind::DESTROY_WORKSPACE,
            event_kind::MOVE_WORKSPACE,
            event_kind::RENAME_WORKSPACE,
            event_kind::MONITOR_ADDED,
            event_kind::MONITOR_REMOVED,
        ]);
        ctx.tasks
            .push(AbortOnDropHandle::new(tokio::spawn(run_workspaces(
                HyprQuery,
                events,
                this.reload_tx.subscribe(),
                ctx.config.workspace_refresh,
                ctx.ui_tx.clone(),
                slot,
            ))));
        this
    }

    pub fn new(container: Handle) -> Self {
        Self {
            state: DesktopState::default(),
            reconciler: Reconciler::new(container),
            reload_tx: ReloadTx::new(),
        }
    }

    pub fn container(&self) -> Handle {
        self.reconciler.container()
    }

    #[cfg(test)]
    pub fn state(&self) -> &DesktopState {
        &self.state
    }

    #[cfg(test)]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn apply_snapshot(&mut self, surface: &mut dyn Surface, snapshot: Snapshot) {
        self.state.apply_snapshot(snapshot);
        self.reconcile(surface);
    }

    /// Reclassifies the cached workspaces without asking the compositor.
    pub fn focus_monitor(&mut self, surface: &mut dyn Surface, payload: &str) {
        self.state.focus_monitor(payload);
        self.reconcile(surface);
    }

    fn reconcile(&mut self, surface: &mut dyn Surface) {
        self.reconciler.reconcile(
            surface,
            &self.state.workspaces,
            self.state.active_monitor.as_deref(),
        );
    }

    /// Requests a full re-query.
    pub fn reload(&self) {
        self.reload_tx.reload();
    }

    pub fn on_input(&mut self, target: Handle, input: Input) -> bool {
        if target == self.container() {
            return true;
        }
        let Some(id) = self.reconciler.workspace_for(target) else {
            return false;
        };
        if input == Input::Click(MouseButton::Left) {
            spawn_action("switch workspace", switch_workspace(id));
        }
        true
    }
}

#[derive(Debug)]
enum Trigger {
    Refresh,
    FocusMonitor(String),
}

/// Fetches an initial snapshot, then re-fetches on workspace events, reload requests and
/// every `refresh_period`. `focusedmon` is forwarded without a query. Triggers are handled
/// one at a time, so whatever arrives last on the presentation thread wins.
async fn run_workspaces(
    mut source: impl SnapshotSource,
    events: UnbRx<CompositorEvent>,
    reload_rx: ReloadRx,
    refresh_period: Duration,
    ui_tx: UiTx<Bar>,
    slot: usize,
) {
    let periodic = IntervalStream::new(tokio::time::interval_at(
        tokio::time::Instant::now() + refresh_period,
        refresh_period,
    ))
    .map(|_| Trigger::Refresh);
    let events = events.map(|ev| match ev.kind.as_str() {
        event_kind::FOCUSED_MONITOR => Trigger::FocusMonitor(ev.payload),
        _ => Trigger::Refresh,
    });
    let reloads = reload_rx.into_stream().map(|()| Trigger::Refresh);
    let triggers =
        tokio_stream::once(Trigger::Refresh).chain(events.merge(reloads).merge(periodic));
    tokio::pin!(triggers);

    while let Some(trigger) = triggers.next().await {
        log::trace!("Workspace trigger {trigger:?}");
        let callback = match trigger {
            Trigger::Refresh => {
                let Some(snapshot) = source.fetch().await.ok_or_log() else {
                    continue;
                };
                update(slot, move |w: &mut Workspaces, s| w.apply_snapshot(s, snapshot))
            }
            Trigger::FocusMonitor(payload) => {
                update(slot, move |w: &mut Workspaces, s| w.focus_monitor(s, &payload))
            }
        };
        if ui_tx.enqueue_boxed(callback).is_break() {
            break;
        }
    }
    log::debug!("Workspace producer stopped");
}
