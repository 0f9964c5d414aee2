//! Bounded tolerance for malformed classifier output.

use tracing::warn;

/// Consecutive malformed outputs tolerated before the degraded signal.
pub const DEFAULT_DEGRADED_AFTER: u32 = 3;

/// Change in classifier health caused by one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSignal {
    /// The failure streak just reached the threshold.
    Degraded { consecutive_failures: u32 },
    /// A valid output arrived after the classifier was degraded.
    Recovered,
}

/// Tracks the current run of malformed or failed classifier outputs.
#[derive(Debug, Clone)]
pub struct ClassifierHealth {
    degraded_after: u32,
    consecutive_failures: u32,
    degraded: bool,
}

impl ClassifierHealth {
    pub fn new(degraded_after: u32) -> Self {
        Self {
            degraded_after: degraded_after.max(1),
            consecutive_failures: 0,
            degraded: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_failure(&mut self) -> Option<HealthSignal> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if !self.degraded && self.consecutive_failures >= self.degraded_after {
            self.degraded = true;
            warn!(
                consecutive_failures = self.consecutive_failures,
                "classifier degraded"
            );
            return Some(HealthSignal::Degraded {
                consecutive_failures: self.consecutive_failures,
            });
        }
        None
    }

    pub fn record_success(&mut self) -> Option<HealthSignal> {
        self.consecutive_failures = 0;
        if self.degraded {
            self.degraded = false;
            return Some(HealthSignal::Recovered);
        }
        None
    }
}

impl Default for ClassifierHealth {
    fn default() -> Self {
        Self::new(DEFAULT_DEGRADED_AFTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrades_once_at_threshold() {
        let mut health = ClassifierHealth::default();
        assert_eq!(health.record_failure(), None);
        assert_eq!(health.record_failure(), None);
        assert_eq!(
            health.record_failure(),
            Some(HealthSignal::Degraded { consecutive_failures: 3 })
        );
        assert_eq!(health.record_failure(), None);
        assert!(health.is_degraded());
        assert_eq!(health.consecutive_failures(), 4);
    }

    #[test]
    fn valid_output_resets_streak_and_recovers() {
        let mut health = ClassifierHealth::new(2);
        health.record_failure();
        assert_eq!(health.record_success(), None);
        health.record_failure();
        assert_eq!(health.record_failure(), Some(HealthSignal::Degraded { consecutive_failures: 2 }));
        assert_eq!(health.record_success(), Some(HealthSignal::Recovered));
        assert!(!health.is_degraded());
    }
}
