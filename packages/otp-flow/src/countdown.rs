//! Resend countdown.
//!
//! An owned, per-flow timer resource. It only drives the visible "resend in
//! m:ss" value; expiry itself is decided by the persisted session's
//! `expires_at`, and the owner re-derives the start value from it on mount.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

pub struct Countdown {
    remaining: Arc<watch::Sender<u64>>,
    ticker: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            remaining: Arc::new(tx),
            ticker: None,
        }
    }

    /// Set `remaining = seconds` and tick down once per second.
    ///
    /// Must be called from within a tokio runtime when `seconds > 0`.
    pub fn start(&mut self, seconds: u64) {
        self.abort_ticker();
        self.remaining.send_replace(seconds);
        if seconds == 0 {
            return;
        }

        debug!(seconds, "countdown started");
        let remaining = Arc::clone(&self.remaining);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tick(&remaining) == 0 {
                    break;
                }
            }
        }));
    }

    /// Cancel ticking, keeping the current value.
    pub fn stop(&mut self) {
        if self.ticker.is_some() {
            debug!(remaining = self.remaining(), "countdown stopped");
        }
        self.abort_ticker();
    }

    /// Decrement once, saturating at zero. Returns the new value.
    pub fn tick(&self) -> u64 {
        tick(&self.remaining)
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Resend is allowed exactly when the countdown has reached zero.
    pub fn can_resend(&self) -> bool {
        self.remaining() == 0
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Watch the remaining seconds, e.g. to re-render a label on every tick.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.subscribe()
    }

    fn abort_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.abort_ticker();
    }
}

fn tick(remaining: &watch::Sender<u64>) -> u64 {
    let mut after = 0;
    remaining.send_if_modified(|value| {
        if *value == 0 {
            return false;
        }
        *value -= 1;
        after = *value;
        true
    });
    after
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_ticks_stop_at_zero() {
        let countdown = Countdown::new();
        countdown.remaining.send_replace(2);
        assert!(!countdown.can_resend());

        assert_eq!(countdown.tick(), 1);
        assert_eq!(countdown.tick(), 0);
        assert_eq!(countdown.tick(), 0);
        assert!(countdown.can_resend());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_once_per_second() {
        let mut countdown = Countdown::new();
        countdown.start(3);
        assert_eq!(countdown.remaining(), 3);
        assert!(!countdown.can_resend());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(countdown.remaining(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(countdown.remaining(), 0);
        assert!(countdown.can_resend());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(countdown.remaining(), 0, "never goes negative");
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_remaining() {
        let mut countdown = Countdown::new();
        countdown.start(10);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        countdown.stop();
        assert_eq!(countdown.remaining(), 8);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(countdown.remaining(), 8);
        assert!(!countdown.can_resend());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_running_ticker() {
        let mut countdown = Countdown::new();
        countdown.start(5);
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(countdown.remaining(), 2);

        countdown.start(120);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(countdown.remaining(), 119);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_each_tick() {
        let mut countdown = Countdown::new();
        let mut rx = countdown.subscribe();
        countdown.start(2);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 0);
    }
}
