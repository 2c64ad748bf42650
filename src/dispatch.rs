//! The hand-off between producer tasks and the presentation thread.
//!
//! Producers never touch presentation state. They enqueue closures through a [`UiTx`],
//! and the presentation thread, the sole owner of a [`UiRx`], runs them one at a time
//! against the state it owns. The queue is unbounded: enqueueing never blocks or waits
//! on the consumer.

use std::ops::ControlFlow;

use crate::utils::{UnbRx, UnbTx, unb_chan};

pub type UiFn<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

pub struct UiTx<S> {
    tx: UnbTx<UiFn<S>>,
}
impl<S> Clone for UiTx<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}
impl<S> std::fmt::Debug for UiTx<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiTx")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
impl<S: 'static> UiTx<S> {
    /// Breaks once the presentation side has gone away, which producers treat as a
    /// signal to stop.
    pub fn enqueue(&self, f: impl FnOnce(&mut S) + Send + 'static) -> ControlFlow<()> {
        self.enqueue_boxed(Box::new(f))
    }

    pub fn enqueue_boxed(&self, f: UiFn<S>) -> ControlFlow<()> {
        match self.tx.send(f) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => {
                log::debug!("Presentation queue closed");
                ControlFlow::Break(())
            }
        }
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct UiRx<S> {
    rx: UnbRx<UiFn<S>>,
}
impl<S> UiRx<S> {
    /// Waits for the next callback. `None` once every producer handle is dropped.
    pub async fn recv(&mut self) -> Option<UiFn<S>> {
        self.rx.recv().await
    }

    /// Runs every callback that is already queued, in order, and returns how many ran.
    pub fn drain(&mut self, state: &mut S) -> usize {
        let mut ran = 0;
        while let Some(f) = self.rx.try_recv() {
            f(state);
            ran += 1;
        }
        ran
    }
}

pub fn ui_queue<S>() -> (UiTx<S>, UiRx<S>) {
    let (tx, rx) = unb_chan();
    (UiTx { tx }, UiRx { rx })
}
