//! Periodic sampling of the cycle timer.
//!
//! A [`Ticker`] owns a background tokio task that samples a value every
//! `interval` and sends it to a single consumer. Stopping is cooperative:
//! the task checks the stop signal before every sample and while waiting to
//! deliver one, so it never emits after [`Ticker::stop`] returns.
//!
//! Must be created from within a tokio runtime.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::engine::{Cycle, CycleTimer};

/// Handle to a running sampler task.
#[derive(Debug)]
pub struct Ticker<T = Cycle> {
    rx: mpsc::Receiver<T>,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Ticker<T> {
    /// Spawn a task calling `sample` every `interval`, starting immediately.
    ///
    /// A zero interval is treated as one millisecond.
    pub fn spawn<F>(interval: Duration, mut sample: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        let period = interval.max(Duration::from_millis(1));
        let (tx, rx) = mpsc::channel(1);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticks.tick() => {}
                }
                if *stop_rx.borrow() {
                    break;
                }
                let value = sample();
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    sent = tx.send(value) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("ticker stopped");
        });

        Self {
            rx,
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Next sample. `None` once the ticker has stopped and every delivered
    /// sample has been read.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl<T> Drop for Ticker<T> {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl CycleTimer {
    /// Emit [`CycleTimer::current_cycle`] every `interval` until stopped.
    pub fn ticker(&self, interval: Duration) -> Ticker<Cycle> {
        let timer = *self;
        Ticker::spawn(interval, move || timer.current_cycle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::timer::{default_origin, Phase};

    #[tokio::test]
    async fn emits_until_stopped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut ticker = Ticker::spawn(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst)
        });

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(ticker.recv().await.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2]);

        ticker.stop().await;
        let after_stop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn stop_closes_the_channel() {
        let mut ticker = Ticker::spawn(Duration::from_millis(5), || 1u8);
        assert_eq!(ticker.recv().await, Some(1));
        let handle_done = {
            let _ = ticker.stop_tx.send(true);
            ticker.handle.take().unwrap()
        };
        handle_done.await.unwrap();

        // At most the one sample already buffered, then closed.
        let mut drained = 0;
        while ticker.recv().await.is_some() {
            drained += 1;
        }
        assert!(drained <= 1);
        assert!(ticker.is_finished());
    }

    #[tokio::test]
    async fn drop_cancels_task() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut ticker = Ticker::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst)
        });
        ticker.recv().await;
        drop(ticker);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_drop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn cycle_ticker_samples_current_cycle() {
        let origin = default_origin();
        let timer = CycleTimer::new(
            chrono::TimeDelta::minutes(30),
            chrono::TimeDelta::minutes(10),
            origin,
            origin,
            1,
        )
        .unwrap();
        let mut ticker = timer.ticker(Duration::from_millis(5));
        let cycle = ticker.recv().await.unwrap();
        // The origin is years in the past, so a one-cycle session is over.
        assert_eq!(cycle.phase, Phase::Done);
        ticker.stop().await;
    }
}
