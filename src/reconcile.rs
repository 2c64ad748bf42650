//! Keeps one display element per workspace name alive across snapshots.

use std::collections::{HashMap, HashSet};

use crate::{
    compositor::Workspace,
    surface::{Handle, Slot, Surface},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    Active,
    InactiveSameMonitor,
    OtherMonitor,
}
impl Class {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::InactiveSameMonitor => "inactive-same-monitor",
            Self::OtherMonitor => "other-monitor",
        }
    }
}

pub fn classify(ws: &Workspace, active_monitor: Option<&str>) -> Class {
    if ws.is_active {
        Class::Active
    } else if active_monitor == Some(ws.monitor_name.as_str()) {
        Class::InactiveSameMonitor
    } else {
        Class::OtherMonitor
    }
}

#[derive(Debug)]
struct DisplayIdentity {
    handle: Handle,
    workspace_id: i64,
    class: Option<Class>,
}

/// What a reconciliation pass changed on the surface.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub reclassified: usize,
    pub reordered: bool,
}
impl Report {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.reclassified == 0 && !self.reordered
    }
}

/// The only writer of workspace buttons. Buttons live under `container`, keyed by
/// workspace name, and keep their handle for as long as the name keeps showing up.
#[derive(Debug)]
pub struct Reconciler {
    container: Handle,
    identities: HashMap<String, DisplayIdentity>,
    order: Vec<Handle>,
}

impl Reconciler {
    pub fn new(container: Handle) -> Self {
        Self {
            container,
            identities: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn container(&self) -> Handle {
        self.container
    }

    pub fn reconcile(
        &mut self,
        surface: &mut dyn Surface,
        workspaces: &[Workspace],
        active_monitor: Option<&str>,
    ) -> Report {
        let mut report = Report::default();
        let present: HashSet<&str> = workspaces.iter().map(|ws| ws.name.as_str()).collect();

        self.identities.retain(|name, identity| {
            if present.contains(name.as_str()) {
                return true;
            }
            surface.remove(identity.handle);
            report.removed.push(name.clone());
            false
        });
        self.order
            .retain(|h| self.identities.values().any(|id| id.handle == *h));

        let mut desired = Vec::with_capacity(workspaces.len());
        for ws in workspaces {
            if !self.identities.contains_key(&ws.name) {
                let handle = surface.add(Slot::Child(self.container));
                surface.set_text(handle, &ws.name);
                self.order.push(handle);
                report.added.push(ws.name.clone());
                self.identities.insert(
                    ws.name.clone(),
                    DisplayIdentity {
                        handle,
                        workspace_id: ws.id,
                        class: None,
                    },
                );
            }
            let Some(identity) = self.identities.get_mut(&ws.name) else {
                continue;
            };
            identity.workspace_id = ws.id;

            let class = classify(ws, active_monitor);
            if identity.class != Some(class) {
                surface.set_classes(identity.handle, &[class.as_str()]);
                identity.class = Some(class);
                report.reclassified += 1;
            }
            if !desired.contains(&identity.handle) {
                desired.push(identity.handle);
            }
        }

        if desired != self.order {
            surface.reorder(self.container, &desired);
            self.order = desired;
            report.reordered = true;
        }

        if !report.is_noop() {
            log::trace!("Reconciled workspaces: {report:?}");
        }
        report
    }

    #[cfg(test)]
    pub fn classification(&self, name: &str) -> Option<Class> {
        self.identities.get(name)?.class
    }

    #[cfg(test)]
    pub fn handle(&self, name: &str) -> Option<Handle> {
        self.identities.get(name).map(|identity| identity.handle)
    }

    /// The workspace id currently bound to a button.
    pub fn workspace_for(&self, handle: Handle) -> Option<i64> {
        self.identities
            .values()
            .find(|identity| identity.handle == handle)
            .map(|identity| identity.workspace_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.identities.len()
    }
}
