use futures::StreamExt as _;

use super::{Bar, InitCtx, ellipsize, update};
use crate::{
    compositor::{CompositorEvent, HyprQuery, SnapshotSource, event_kind},
    dispatch::UiTx,
    surface::{Handle, Surface},
    utils::{ResultExt as _, UnbRx},
};

const MAX_TITLE_CHARS: usize = 30;

pub struct WindowTitle {
    pub handle: Handle,
    title: String,
}

impl WindowTitle {
    pub fn initialize(
        handle: Handle,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
    ) -> Self {
        surface.set_text(handle, "Window");
        let events = ctx.listener.subscribe(&[event_kind::ACTIVE_WINDOW]);
        ctx.tasks.push(tokio_util::task::AbortOnDropHandle::new(tokio::spawn(
            run_window(HyprQuery, events, ctx.ui_tx.clone(), slot),
        )));
        Self {
            handle,
            title: "Window".into(),
        }
    }

    pub fn set_title(&mut self, surface: &mut dyn Surface, title: &str) {
        let title = ellipsize(title, MAX_TITLE_CHARS);
        if title != self.title {
            surface.set_text(self.handle, &title);
            self.title = title;
        }
    }
}

async fn run_window(
    mut source: impl SnapshotSource,
    mut events: UnbRx<CompositorEvent>,
    ui_tx: UiTx<Bar>,
    slot: usize,
) {
    let initial = source.fetch().await.ok_or_log().and_then(|snapshot| {
        snapshot
            .workspaces
            .into_iter()
            .find(|ws| ws.is_active)
            .map(|ws| ws.last_active_window_title)
    });
    if let Some(title) = initial
        && ui_tx
            .enqueue_boxed(update(slot, move |w: &mut WindowTitle, s| {
                w.set_title(s, &title)
            }))
            .is_break()
    {
        return;
    }

    while let Some(CompositorEvent { payload, .. }) = events.next().await {
        if ui_tx
            .enqueue_boxed(update(slot, move |w: &mut WindowTitle, s| {
                w.set_title(s, &payload)
            }))
            .is_break()
        {
            return;
        }
    }
    log::debug!("Active window events ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compositor::{Snapshot, Workspace},
        surface::{Section, Slot},
        utils::unb_chan,
        widgets::{Widget, test_util},
    };

    struct Fixed(Snapshot);
    impl SnapshotSource for Fixed {
        async fn fetch(&mut self) -> anyhow::Result<Snapshot> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn initial_title_then_events() {
        let (mut bar, surface) = test_util::bare_bar();
        let handle = bar.surface_mut().add(Slot::Section(Section::Left));
        bar.widgets.push(Widget::Window(WindowTitle {
            handle,
            title: "Window".into(),
        }));

        let snapshot = Snapshot {
            workspaces: vec![Workspace {
                id: 1,
                name: "1".into(),
                last_active_window_title: "nvim".into(),
                monitor_name: "DP-1".into(),
                is_active: true,
            }],
            monitors: vec![],
        };
        let (ev_tx, ev_rx) = unb_chan();
        let (ui_tx, mut ui_rx) = test_util::queue();
        ev_tx
            .send(CompositorEvent {
                kind: "activewindow".into(),
                payload: "a very long window title that keeps on going".into(),
            })
            .unwrap();
        drop(ev_tx);

        run_window(Fixed(snapshot), ev_rx, ui_tx, 0).await;

        let f = ui_rx.recv().await.unwrap();
        f(&mut bar);
        assert_eq!(surface.text(handle).as_deref(), Some("nvim"));
        ui_rx.drain(&mut bar);
        assert_eq!(
            surface.text(handle).as_deref(),
            Some("a very long window title th...")
        );
    }
}
