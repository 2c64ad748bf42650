use futures::Stream;
use tokio::sync::watch;

/// Receiving side of a "refresh now" request. Multiple requests issued before the
/// receiver wakes up collapse into one.
#[derive(Clone)]
pub struct ReloadRx {
    rx: watch::Receiver<()>,
}
impl ReloadRx {
    #[must_use]
    pub async fn wait(&mut self) -> Option<()> {
        let opt = self.rx.changed().await.ok();
        self.rx.mark_unchanged();
        opt
    }
    pub fn into_stream(mut self) -> impl Stream<Item = ()> {
        super::stream_from_fn(async move || self.wait().await)
    }
}

#[derive(Clone)]
pub struct ReloadTx {
    tx: watch::Sender<()>,
}
impl ReloadTx {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(()),
        }
    }
    pub fn reload(&self) {
        self.tx.send_replace(());
    }
    pub fn subscribe(&self) -> ReloadRx {
        ReloadRx {
            rx: self.tx.subscribe(),
        }
    }
}

/// Waits on an optional reload receiver. Pending forever when there is none or the
/// sender is gone.
pub async fn wait_reload(reload_rx: &mut Option<ReloadRx>) {
    match reload_rx {
        Some(rx) => {
            if rx.wait().await.is_none() {
                *reload_rx = None;
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
