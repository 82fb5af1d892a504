// Tick sources driving a playfield: a wall-clock interval in production and a
// manually triggered one for deterministic tests.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};

#[async_trait]
pub trait TickSource: Send + 'static {
    /// Waits for the next tick. Never resolves after `stop`.
    async fn tick(&mut self);

    fn stop(&mut self);
}

/// Ticks on a fixed period.
pub struct IntervalTicker {
    interval: Interval,
    stopped: bool,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        // A slow tick should not cause a burst of catch-up ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            stopped: false,
        }
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    async fn tick(&mut self) {
        if self.stopped {
            std::future::pending::<()>().await;
        }
        self.interval.tick().await;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Ticks only when a [`TickTrigger`] fires.
pub struct ManualTicker {
    // Each tick carries an acknowledgement that is answered once the loop takes it.
    ticks: mpsc::Receiver<oneshot::Sender<()>>,
}

/// Fires ticks into a [`ManualTicker`].
#[derive(Clone)]
pub struct TickTrigger {
    ticks: mpsc::Sender<oneshot::Sender<()>>,
}

/// Returned when the ticker on the other end is gone or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerStopped;

impl ManualTicker {
    pub fn new() -> (Self, TickTrigger) {
        let (ticks_tx, ticks_rx) = mpsc::channel(1);
        (Self { ticks: ticks_rx }, TickTrigger { ticks: ticks_tx })
    }
}

#[async_trait]
impl TickSource for ManualTicker {
    async fn tick(&mut self) {
        match self.ticks.recv().await {
            Some(ack) => {
                let _ = ack.send(());
            }
            // Every trigger is gone; no tick can ever arrive again.
            None => std::future::pending::<()>().await,
        }
    }

    fn stop(&mut self) {
        self.ticks.close();
    }
}

impl TickTrigger {
    /// Fires one tick and waits until the consumer has taken it.
    pub async fn tick(&self) -> Result<(), TickerStopped> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.ticks.send(ack_tx).await.map_err(|_| TickerStopped)?;
        ack_rx.await.map_err(|_| TickerStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn when_trigger_fires_then_manual_ticker_ticks_and_acknowledges() {
        let (mut ticker, trigger) = ManualTicker::new();

        let consumer = tokio::spawn(async move {
            ticker.tick().await;
            ticker
        });
        timeout(Duration::from_secs(1), trigger.tick())
            .await
            .expect("timed out waiting for tick acknowledgement")
            .expect("expected ticker to be alive");

        consumer.await.expect("consumer task panicked");
    }

    #[tokio::test]
    async fn when_nothing_fires_then_manual_ticker_waits() {
        let (mut ticker, _trigger) = ManualTicker::new();

        let result = timeout(Duration::from_millis(50), ticker.tick()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn when_manual_ticker_is_stopped_then_trigger_reports_it() {
        let (mut ticker, trigger) = ManualTicker::new();

        ticker.stop();

        assert_eq!(trigger.tick().await, Err(TickerStopped));
    }

    #[tokio::test]
    async fn when_interval_elapses_then_interval_ticker_ticks() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(10));

        for _ in 0..3 {
            timeout(Duration::from_secs(1), ticker.tick())
                .await
                .expect("timed out waiting for interval tick");
        }
    }

    #[tokio::test]
    async fn when_interval_ticker_is_stopped_then_it_never_ticks_again() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(5));
        ticker.tick().await;

        ticker.stop();

        let result = timeout(Duration::from_millis(50), ticker.tick()).await;
        assert!(result.is_err());
    }
}
