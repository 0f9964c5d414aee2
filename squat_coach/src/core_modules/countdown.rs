//! One-second countdown timers for the start delay and the rest between sets.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

const ONE_SECOND: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountdownKind {
    /// Delay between pressing start and the first classified frame.
    Start,
    /// Rest between two sets.
    Rest,
}

/// A countdown that fires once per second until it reaches zero.
#[derive(Debug)]
pub struct Countdown {
    kind: CountdownKind,
    seconds_remaining: u32,
    ticker: Interval,
}

impl Countdown {
    /// Returns `None` for a zero-length countdown.
    pub fn new(kind: CountdownKind, seconds: u32) -> Option<Self> {
        if seconds == 0 {
            return None;
        }
        let mut ticker = interval_at(Instant::now() + ONE_SECOND, ONE_SECOND);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(Self {
            kind,
            seconds_remaining: seconds,
            ticker,
        })
    }

    pub fn kind(&self) -> CountdownKind {
        self.kind
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_done(&self) -> bool {
        self.seconds_remaining == 0
    }

    /// Waits for the next second to elapse and returns the seconds left.
    pub async fn tick(&mut self) -> u32 {
        self.ticker.tick().await;
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        self.seconds_remaining
    }
}
