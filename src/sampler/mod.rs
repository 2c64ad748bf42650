//! Periodic probes that publish typed samples through the presentation queue.
//!
//! A [`Sampler`] owns one probe and one parser. Every tick it reads the probe, parses the
//! raw output and, on success, hands the resulting [`Sample`] to its result callback,
//! which may only produce a presentation callback. Failures are logged and leave the
//! sample history untouched, so the last good value stays on screen.

mod probe;
pub use probe::*;

use std::time::Duration;

use anyhow::Context as _;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::task::AbortOnDropHandle;

use crate::{
    dispatch::{UiFn, UiTx},
    utils::{ReloadRx, wait_reload},
};

/// One accepted observation, together with the accepted observation before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub value: T,
    pub previous: Option<T>,
    /// Time since `previous` was observed.
    pub elapsed: Option<Duration>,
}

/// Monotonic counters that can be turned into a per-second rate.
pub trait Counter {
    type Rate;
    /// `None` when there is no meaningful rate, e.g. because the counter went backwards.
    fn rate_since(&self, previous: &Self, elapsed_secs: f64) -> Option<Self::Rate>;
}
impl Counter for u64 {
    type Rate = f64;
    fn rate_since(&self, previous: &Self, elapsed_secs: f64) -> Option<f64> {
        let delta = self.checked_sub(*previous)?;
        Some(delta as f64 / elapsed_secs)
    }
}

impl<T: Counter> Sample<T> {
    pub fn rate(&self) -> Option<T::Rate> {
        let previous = self.previous.as_ref()?;
        let elapsed = self.elapsed?.as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        self.value.rate_since(previous, elapsed)
    }
}

/// Remembers the last accepted value of a sampler.
#[derive(Debug)]
pub struct SampleHistory<T> {
    last: Option<(T, Instant)>,
}
impl<T> Default for SampleHistory<T> {
    fn default() -> Self {
        Self { last: None }
    }
}
impl<T: Clone> SampleHistory<T> {
    pub fn accept(&mut self, value: T, now: Instant) -> Sample<T> {
        let (previous, elapsed) = match self.last.replace((value.clone(), now)) {
            Some((prev, at)) => (Some(prev), Some(now.saturating_duration_since(at))),
            None => (None, None),
        };
        Sample {
            value,
            previous,
            elapsed,
        }
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&T> {
        self.last.as_ref().map(|(value, _)| value)
    }
}

type ParseFn<R, T> = Box<dyn FnMut(R) -> anyhow::Result<T> + Send>;
type ErrorFn<S> = Box<dyn FnMut(&anyhow::Error) -> Option<UiFn<S>> + Send>;

pub struct Sampler<P: Probe, T, S> {
    name: &'static str,
    interval: Duration,
    probe: P,
    parse: ParseFn<P::Raw, T>,
    history: SampleHistory<T>,
    reload_rx: Option<ReloadRx>,
    on_error: Option<ErrorFn<S>>,
}

impl<P, T, S> Sampler<P, T, S>
where
    P: Probe,
    T: Clone + Send + 'static,
    S: 'static,
{
    pub fn new(
        name: &'static str,
        interval: Duration,
        probe: P,
        parse: impl FnMut(P::Raw) -> anyhow::Result<T> + Send + 'static,
    ) -> Self {
        Self {
            name,
            interval,
            probe,
            parse: Box::new(parse),
            history: SampleHistory::default(),
            reload_rx: None,
            on_error: None,
        }
    }

    /// Samples immediately whenever a reload is requested, in addition to the interval.
    pub fn reload_on(mut self, reload_rx: ReloadRx) -> Self {
        self.reload_rx = Some(reload_rx);
        self
    }

    /// Lets a failed tick still publish something. Logging happens regardless.
    pub fn on_error(
        mut self,
        f: impl FnMut(&anyhow::Error) -> Option<UiFn<S>> + Send + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Probes and parses once. The history only advances on success.
    pub async fn tick(&mut self, now: Instant) -> anyhow::Result<Sample<T>> {
        let raw = self
            .probe
            .read()
            .await
            .with_context(|| format!("{}: probe failed", self.name))?;
        let value = (self.parse)(raw).with_context(|| format!("{}: parse failed", self.name))?;
        Ok(self.history.accept(value, now))
    }

    #[cfg(test)]
    pub fn history(&self) -> &SampleHistory<T> {
        &self.history
    }

    pub fn spawn(
        self,
        ui_tx: UiTx<S>,
        on_result: impl FnMut(Sample<T>) -> Option<UiFn<S>> + Send + 'static,
    ) -> AbortOnDropHandle<()> {
        AbortOnDropHandle::new(tokio::spawn(self.run(ui_tx, on_result)))
    }

    async fn run(
        mut self,
        ui_tx: UiTx<S>,
        mut on_result: impl FnMut(Sample<T>) -> Option<UiFn<S>> + Send + 'static,
    ) {
        log::debug!("Starting sampler {} ({:?})", self.name, self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reload_rx = self.reload_rx.take();

        loop {
            let now = tokio::select! {
                now = ticker.tick() => now,
                () = wait_reload(&mut reload_rx) => Instant::now(),
            };

            let update = match self.tick(now).await {
                Ok(sample) => on_result(sample),
                Err(err) => {
                    log::warn!("{err:#}");
                    self.on_error.as_mut().and_then(|f| f(&err))
                }
            };
            if let Some(update) = update
                && ui_tx.enqueue_boxed(update).is_break()
            {
                break;
            }
        }
        log::debug!("Sampler {} stopped", self.name);
    }
}
