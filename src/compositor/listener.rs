use std::{collections::HashMap, path::Path};

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, BufReader};
use tokio_util::task::AbortOnDropHandle;

use super::CompositorEvent;
use crate::utils::{UnbRx, UnbTx, unb_chan};

type EventReader = Box<dyn AsyncRead + Send + Unpin>;

/// Owns the single connection to the compositor's event socket and fans parsed
/// events out to per-subscriber channels.
///
/// Subscriptions are registered before [`EventListener::spawn`]; the read loop then owns
/// the connection until it ends. There is no reconnect: once the stream closes, the
/// subscriber channels close with it.
pub struct EventListener {
    reader: EventReader,
    subscribers: HashMap<String, Vec<UnbTx<CompositorEvent>>>,
}

impl EventListener {
    pub async fn connect(socket_path: &Path) -> anyhow::Result<Self> {
        let stream = tokio::net::UnixStream::connect(socket_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to compositor socket {}",
                    socket_path.display()
                )
            })?;
        log::info!("Connected to compositor socket {}", socket_path.display());
        Ok(Self::from_reader(stream))
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            subscribers: HashMap::new(),
        }
    }

    /// One channel receiving every event whose type is in `kinds`, in socket order.
    pub fn subscribe(&mut self, kinds: &[&str]) -> UnbRx<CompositorEvent> {
        let (tx, rx) = unb_chan();
        for &kind in kinds {
            self.subscribers
                .entry(kind.to_owned())
                .or_default()
                .push(tx.clone());
        }
        rx
    }

    pub fn spawn(self) -> AbortOnDropHandle<()> {
        AbortOnDropHandle::new(tokio::spawn(self.run()))
    }

    async fn run(self) {
        let Self {
            reader,
            mut subscribers,
        } = self;
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    log::warn!("Compositor event stream closed");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    log::error!("Failed to read compositor event stream: {err}");
                    break;
                }
            }

            let record = String::from_utf8_lossy(&buf);
            let Some(event) = CompositorEvent::parse(&record) else {
                log::trace!("Ignoring compositor record {record:?}");
                continue;
            };
            let Some(txs) = subscribers.get_mut(&event.kind) else {
                continue;
            };
            txs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    fn ev(kind: &str, payload: &str) -> CompositorEvent {
        CompositorEvent {
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_subscriber_of_a_type() {
        let input: &[u8] = b"activewindow>>kitty\n\
            noise without delimiter\n\
            workspace>>2\n\
            focusedmon>>HDMI-1,2\n\
            activewindow>>firefox\n";
        let mut listener = EventListener::from_reader(input);
        let window_a = listener.subscribe(&["activewindow"]);
        let window_b = listener.subscribe(&["activewindow"]);
        let desktop = listener.subscribe(&["workspace", "focusedmon"]);
        listener.spawn().await.unwrap();

        let expected_window = vec![ev("activewindow", "kitty"), ev("activewindow", "firefox")];
        assert_eq!(window_a.collect::<Vec<_>>().await, expected_window);
        assert_eq!(window_b.collect::<Vec<_>>().await, expected_window);
        assert_eq!(
            desktop.collect::<Vec<_>>().await,
            vec![ev("workspace", "2"), ev("focusedmon", "HDMI-1,2")]
        );
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_stop_others() {
        let input: &[u8] = b"workspace>>1\nworkspace>>2\n";
        let mut listener = EventListener::from_reader(input);
        drop(listener.subscribe(&["workspace"]));
        let kept = listener.subscribe(&["workspace"]);
        listener.spawn().await.unwrap();

        assert_eq!(kept.collect::<Vec<_>>().await.len(), 2);
    }

    #[tokio::test]
    async fn unterminated_last_record_is_still_delivered() {
        let input: &[u8] = b"workspace>>3";
        let mut listener = EventListener::from_reader(input);
        let rx = listener.subscribe(&["workspace"]);
        listener.spawn().await.unwrap();
        assert_eq!(rx.collect::<Vec<_>>().await, vec![ev("workspace", "3")]);
    }

    #[tokio::test]
    async fn reads_from_unix_socket() {
        use tokio::io::AsyncWriteExt as _;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".socket2.sock");
        let server = tokio::net::UnixListener::bind(&path).unwrap();

        let mut listener = EventListener::connect(&path).await.unwrap();
        let rx = listener.subscribe(&["activewindow"]);
        let handle = listener.spawn();

        let (mut conn, _) = server.accept().await.unwrap();
        conn.write_all(b"activewindow>>htop\n").await.unwrap();
        drop(conn);

        assert_eq!(
            rx.collect::<Vec<_>>().await,
            vec![ev("activewindow", "htop")]
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn connect_fails_without_socket() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            EventListener::connect(&dir.path().join("missing.sock"))
                .await
                .is_err()
        );
    }
}
