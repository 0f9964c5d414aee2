//! The record handed to the persistence gateway when a workout finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workout type recorded for squat sessions.
pub const SQUAT_WORKOUT: &str = "squat";

/// Immutable summary of one finished workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSummaryRecord {
    #[serde(rename = "type")]
    pub workout_type: String,
    pub total_reps: u32,
    pub total_sets: u32,
    /// Percentage, may be negative.
    pub accuracy: i64,
    pub timestamp: DateTime<Utc>,
}
