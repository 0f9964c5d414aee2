// THEORY:
// The `session` module tracks where the user is inside a workout: which set,
// how many reps remain in it, and how accurate the workout has been so far. It
// reacts to finished rep attempts, never to raw frames.
//
// Key architectural principles:
// 1.  **Plan is immutable**: a `WorkoutPlan` is fixed at session start. Counters
//     are derived from it and only ever move towards zero.
// 2.  **Accuracy is a debit**: `successful_rep_count` starts at the number of
//     planned reps and loses one per failed attempt. It is signed and is never
//     clamped at zero.
// 3.  **Set boundaries are two-step**: `on_rep_outcome` reports a finished set;
//     the reps are only refilled by `begin_next_set`, once the caller has run its
//     rest period.

use crate::core_modules::phase::RepOutcome;
use crate::core_modules::summary::WorkoutSummaryRecord;
use crate::error::SessionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Reps and sets requested for one workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PlanFields")]
pub struct WorkoutPlan {
    total_reps: u32,
    total_sets: u32,
}

#[derive(Deserialize)]
struct PlanFields {
    total_reps: u32,
    total_sets: u32,
}

impl TryFrom<PlanFields> for WorkoutPlan {
    type Error = SessionError;

    fn try_from(fields: PlanFields) -> Result<Self, Self::Error> {
        Self::new(fields.total_reps, fields.total_sets)
    }
}

impl WorkoutPlan {
    /// Rejects zero counts and plans whose total rep count does not fit an `i64`.
    pub fn new(total_reps: u32, total_sets: u32) -> Result<Self, SessionError> {
        let planned = u64::from(total_reps) * u64::from(total_sets);
        if planned == 0 || i64::try_from(planned).is_err() {
            return Err(SessionError::InvalidPlan {
                reps: total_reps,
                sets: total_sets,
            });
        }
        Ok(Self {
            total_reps,
            total_sets,
        })
    }

    pub fn total_reps(&self) -> u32 {
        self.total_reps
    }

    pub fn total_sets(&self) -> u32 {
        self.total_sets
    }

    /// Number of reps planned across every set.
    pub fn planned_reps(&self) -> u64 {
        u64::from(self.total_reps) * u64::from(self.total_sets)
    }
}

/// Live counters for the session in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub reps_remaining_in_set: u32,
    pub sets_remaining: u32,
    pub completed_rep_count: u32,
    pub successful_rep_count: i64,
}

impl SessionCounters {
    fn from_plan(plan: &WorkoutPlan) -> Self {
        Self {
            reps_remaining_in_set: plan.total_reps,
            sets_remaining: plan.total_sets,
            completed_rep_count: 0,
            successful_rep_count: i64::try_from(plan.planned_reps()).unwrap_or(i64::MAX),
        }
    }
}

/// What a rep outcome did to the workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProgress {
    /// The set continues.
    RepRecorded,
    /// The set is finished and at least one set remains.
    SetComplete { sets_remaining: u32 },
    /// The last set is finished.
    WorkoutComplete,
    /// The outcome arrived between sets and was not counted.
    Resting,
}

/// Accuracy percentage: ceil(successful / planned * 100), exact integer arithmetic.
/// Saturates at the `i64` bounds.
pub fn accuracy(successful_rep_count: i64, plan: &WorkoutPlan) -> i64 {
    let numerator = i128::from(successful_rep_count) * 100;
    let denominator = i128::from(plan.planned_reps());
    let mut percent = numerator.div_euclid(denominator);
    if numerator.rem_euclid(denominator) != 0 {
        percent += 1;
    }
    i64::try_from(percent).unwrap_or(if percent < 0 { i64::MIN } else { i64::MAX })
}

/// Applies rep outcomes to the session counters.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    plan: WorkoutPlan,
    counters: SessionCounters,
}

impl SessionTracker {
    pub fn new(plan: WorkoutPlan) -> Self {
        Self {
            plan,
            counters: SessionCounters::from_plan(&plan),
        }
    }

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn is_finished(&self) -> bool {
        self.counters.sets_remaining == 0
    }

    /// A set just finished and `begin_next_set` has not run yet.
    pub fn is_resting(&self) -> bool {
        self.counters.reps_remaining_in_set == 0 && !self.is_finished()
    }

    pub fn on_rep_outcome(&mut self, outcome: RepOutcome) -> SessionProgress {
        if self.is_finished() {
            return SessionProgress::WorkoutComplete;
        }
        if self.is_resting() {
            return SessionProgress::Resting;
        }

        match outcome {
            RepOutcome::Success => {
                self.counters.completed_rep_count = self.counters.completed_rep_count.saturating_add(1);
            }
            RepOutcome::Failure => {
                self.counters.successful_rep_count = self.counters.successful_rep_count.saturating_sub(1);
            }
        }
        self.counters.reps_remaining_in_set -= 1;

        if self.counters.reps_remaining_in_set > 0 {
            return SessionProgress::RepRecorded;
        }

        self.counters.sets_remaining -= 1;
        if self.counters.sets_remaining == 0 {
            info!(
                completed = self.counters.completed_rep_count,
                accuracy = self.current_accuracy(),
                "workout complete"
            );
            SessionProgress::WorkoutComplete
        } else {
            info!(sets_remaining = self.counters.sets_remaining, "set complete");
            SessionProgress::SetComplete {
                sets_remaining: self.counters.sets_remaining,
            }
        }
    }

    /// Refills the reps for the next set.
    pub fn begin_next_set(&mut self) {
        if !self.is_finished() {
            self.counters.reps_remaining_in_set = self.plan.total_reps;
        }
    }

    pub fn current_accuracy(&self) -> i64 {
        accuracy(self.counters.successful_rep_count, &self.plan)
    }

    pub fn summary(&self, workout_type: &str, timestamp: DateTime<Utc>) -> WorkoutSummaryRecord {
        WorkoutSummaryRecord {
            workout_type: workout_type.to_string(),
            total_reps: self.plan.total_reps,
            total_sets: self.plan.total_sets,
            accuracy: self.current_accuracy(),
            timestamp,
        }
    }
}
