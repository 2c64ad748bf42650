use anyhow::Context as _;
use hyprland::{data, shared::HyprData};

use super::{Monitor, Snapshot, Workspace};

/// Where fresh workspace/monitor snapshots come from.
pub trait SnapshotSource: Send + 'static {
    fn fetch(&mut self) -> impl Future<Output = anyhow::Result<Snapshot>> + Send;
}

/// Queries the running compositor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HyprQuery;

impl SnapshotSource for HyprQuery {
    async fn fetch(&mut self) -> anyhow::Result<Snapshot> {
        fetch_snapshot().await
    }
}

pub async fn fetch_snapshot() -> anyhow::Result<Snapshot> {
    let (wss, mrs) = futures::future::try_join(
        async {
            data::Workspaces::get_async()
                .await
                .context("Failed to fetch workspaces")
        },
        async {
            data::Monitors::get_async()
                .await
                .context("Failed to fetch monitors")
        },
    )
    .await?;

    let mut monitor_names = std::collections::HashMap::new();
    let monitors: Vec<_> = mrs
        .into_iter()
        .filter_map(|mr| {
            let id = mr.id.try_into().ok()?;
            monitor_names.insert(mr.id, mr.name.clone());
            Some(Monitor {
                id,
                name: mr.name,
                is_active: mr.focused,
                active_workspace_id: mr.active_workspace.id.try_into().ok()?,
            })
        })
        .collect();

    let workspaces = wss
        .into_iter()
        // Special (scratchpad) workspaces have negative ids.
        .filter(|ws| ws.id >= 0)
        .filter_map(|ws| {
            let monitor_name = ws
                .monitor_id
                .and_then(|id| monitor_names.get(&id).cloned())
                .unwrap_or_default();
            Some(Workspace {
                id: ws.id.try_into().ok()?,
                name: ws.name,
                last_active_window_title: ws.last_window_title,
                monitor_name,
                is_active: false,
            })
        })
        .collect();

    Ok(Snapshot::assemble(workspaces, monitors))
}

impl Snapshot {
    /// Orders workspaces by id and marks the focused monitor's workspace as active.
    pub fn assemble(mut workspaces: Vec<Workspace>, monitors: Vec<Monitor>) -> Self {
        workspaces.sort_by_key(|ws| ws.id);
        let mut snapshot = Self {
            workspaces,
            monitors,
        };
        if let Some(active) = snapshot.focused_monitor().map(|mon| mon.active_workspace_id) {
            mark_active(&mut snapshot.workspaces, |ws| ws.id == active);
        }
        snapshot
    }
}

/// Exactly the workspaces matching `is_active` end up active.
pub fn mark_active(workspaces: &mut [Workspace], is_active: impl Fn(&Workspace) -> bool) {
    for ws in workspaces {
        ws.is_active = is_active(ws);
    }
}

/// Asks the compositor to show a workspace.
pub async fn switch_workspace(id: i64) -> anyhow::Result<()> {
    use hyprland::dispatch::{Dispatch, DispatchType, WorkspaceIdentifierWithSpecial};

    let id: hyprland::shared::WorkspaceId = id
        .try_into()
        .with_context(|| format!("Workspace id {id} out of range"))?;
    Dispatch::call_async(DispatchType::Workspace(WorkspaceIdentifierWithSpecial::Id(
        id,
    )))
    .await
    .with_context(|| format!("Failed to switch to workspace {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(id: i64, monitor: &str) -> Workspace {
        Workspace {
            id,
            name: id.to_string(),
            last_active_window_title: String::new(),
            monitor_name: monitor.into(),
            is_active: false,
        }
    }
    fn mon(id: i64, name: &str, focused: bool, active_ws: i64) -> Monitor {
        Monitor {
            id,
            name: name.into(),
            is_active: focused,
            active_workspace_id: active_ws,
        }
    }

    #[test]
    fn assemble_sorts_and_marks_focused_workspace() {
        let snapshot = Snapshot::assemble(
            vec![ws(3, "HDMI-1"), ws(1, "DP-1"), ws(2, "DP-1")],
            vec![mon(0, "DP-1", true, 2), mon(1, "HDMI-1", false, 3)],
        );
        let ids: Vec<_> = snapshot.workspaces.iter().map(|w| w.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        let active: Vec<_> = snapshot
            .workspaces
            .iter()
            .filter(|w| w.is_active)
            .map(|w| w.id)
            .collect();
        assert_eq!(active, [2]);
    }

    #[test]
    fn no_focused_monitor_means_no_active_workspace() {
        let snapshot = Snapshot::assemble(
            vec![ws(1, "DP-1")],
            vec![mon(0, "DP-1", false, 1)],
        );
        assert!(snapshot.workspaces.iter().all(|w| !w.is_active));
        assert_eq!(snapshot.focused_monitor(), None);
    }
}
