mod listener;
mod query;

pub use listener::*;
pub use query::*;

use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub last_active_window_title: String,
    pub monitor_name: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub active_workspace_id: i64,
}

/// A point-in-time view of the compositor, always replaced as a whole.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub workspaces: Vec<Workspace>,
    pub monitors: Vec<Monitor>,
}
impl Snapshot {
    pub fn focused_monitor(&self) -> Option<&Monitor> {
        self.monitors.iter().find(|mon| mon.is_active)
    }
}

/// One `TYPE>>payload` record from the event socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositorEvent {
    pub kind: String,
    pub payload: String,
}
impl CompositorEvent {
    /// Splits on the first `>>`. Records without it are noise.
    pub fn parse(record: &str) -> Option<Self> {
        let record = record.strip_suffix('\n').unwrap_or(record);
        let record = record.strip_suffix('\r').unwrap_or(record);
        let (kind, payload) = record.split_once(">>")?;
        Some(Self {
            kind: kind.into(),
            payload: payload.into(),
        })
    }
}

pub mod event_kind {
    pub const ACTIVE_WINDOW: &str = "activewindow";
    pub const WORKSPACE: &str = "workspace";
    pub const FOCUSED_MONITOR: &str = "focusedmon";
    pub const CREATE_WORKSPACE: &str = "createworkspace";
    pub const DESTROY_WORKSPACE: &str = "destroyworkspace";
    pub const MOVE_WORKSPACE: &str = "moveworkspace";
    pub const RENAME_WORKSPACE: &str = "renameworkspace";
    pub const MONITOR_ADDED: &str = "monitoradded";
    pub const MONITOR_REMOVED: &str = "monitorremoved";
}

pub fn event_socket_path(runtime_dir: &Path, instance_signature: &str) -> PathBuf {
    runtime_dir
        .join("hypr")
        .join(instance_signature)
        .join(".socket2.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_delimiter_only() {
        let ev = CompositorEvent::parse("activewindow>>kitty>>nvim\n").unwrap();
        assert_eq!(ev.kind, "activewindow");
        assert_eq!(ev.payload, "kitty>>nvim");
    }

    #[test]
    fn records_without_delimiter_are_dropped() {
        assert_eq!(CompositorEvent::parse("garbage"), None);
        assert_eq!(CompositorEvent::parse(""), None);
        assert_eq!(CompositorEvent::parse("workspace>"), None);
    }

    #[test]
    fn empty_payload_is_kept() {
        let ev = CompositorEvent::parse("activewindow>>\r\n").unwrap();
        assert_eq!(ev.payload, "");
    }

    #[test]
    fn socket_path_layout() {
        assert_eq!(
            event_socket_path(Path::new("/run/user/1000"), "abc_123"),
            Path::new("/run/user/1000/hypr/abc_123/.socket2.sock")
        );
    }
}
