pub type UnbTx<T> = tokio::sync::mpsc::UnboundedSender<T>;
#[derive(Debug)]
pub struct UnbRx<T> {
    pub inner: tokio::sync::mpsc::UnboundedReceiver<T>,
}
impl<T> UnbRx<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.recv().await
    }
    pub fn try_recv(&mut self) -> Option<T> {
        self.inner.try_recv().ok()
    }
}
const _: () = {
    use tokio::sync::mpsc::UnboundedReceiver;

    impl<T> futures::Stream for UnbRx<T> {
        type Item = T;

        fn poll_next(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Self::Item>> {
            self.inner.poll_recv(cx)
        }

        fn size_hint(&self) -> (usize, Option<usize>) {
            (self.inner.len(), None)
        }
    }

    impl<T> From<UnboundedReceiver<T>> for UnbRx<T> {
        fn from(rx: UnboundedReceiver<T>) -> Self {
            Self { inner: rx }
        }
    }
};
pub fn unb_chan<T>() -> (UnbTx<T>, UnbRx<T>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (tx, rx.into())
}
