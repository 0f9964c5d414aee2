// THEORY:
// `WorkoutHistory` is the read side of persisted workouts for one user. The
// persistence gateway appends `WorkoutSummaryRecord`s; the history answers the
// questions a progress dashboard asks: the most recent sessions, the latest
// activity date and lifetime totals.

use crate::core_modules::summary::WorkoutSummaryRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of workouts shown as "most recent".
pub const RECENT_WORKOUTS: usize = 3;

/// Every stored workout for one user, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkoutHistory {
    records: Vec<WorkoutSummaryRecord>,
}

impl WorkoutHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: WorkoutSummaryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WorkoutSummaryRecord] {
        &self.records
    }

    /// The last `count` stored workouts, newest first.
    pub fn recent(&self, count: usize) -> Vec<&WorkoutSummaryRecord> {
        self.records.iter().rev().take(count).collect()
    }

    /// Timestamp of the most recently stored workout.
    pub fn latest_activity(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|r| r.timestamp)
    }

    /// Planned reps across every stored workout.
    pub fn lifetime_reps(&self) -> u64 {
        self.records
            .iter()
            .map(|r| u64::from(r.total_reps) * u64::from(r.total_sets))
            .sum()
    }

    pub fn lifetime_sets(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.total_sets)).sum()
    }
}

impl FromIterator<WorkoutSummaryRecord> for WorkoutHistory {
    fn from_iter<I: IntoIterator<Item = WorkoutSummaryRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
