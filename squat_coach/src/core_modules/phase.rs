// THEORY:
// The `phase` module is the rep counter itself. It consumes one validated
// `ProbabilityVector` per frame and walks a single repetition attempt through a
// closed cycle of phases:
//
//     Pending -> Starting -> Middle -> Squatting -> Pending   (Success)
//                            Middle ---------------> Pending   (Failure)
//
// A rep is only credited after a confirmed Squatting phase. Returning to the
// starting posture from Middle is scored as a failed attempt.
//
// Key architectural principles:
// 1.  **Pure transition function**: `PhaseState::next` has no side effects and no
//     timers. It maps (state, probabilities, thresholds) to (state, outcome).
// 2.  **One transition per tick**: every arm of the match fires at most one edge.
//     In `Middle` the depth guard is checked before the failure guard.
// 3.  **Exhaustive states**: the phase is a closed enum, so there is no invalid
//     phase to recover from.

use crate::core_modules::probability::{PostureClass, ProbabilityVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Starting-class probability that opens a rep and closes a squat.
pub const STARTING_THRESHOLD: f32 = 0.90;
/// Middle-class probability that confirms the descent has begun.
pub const MIDDLE_THRESHOLD: f32 = 0.50;
/// Squatting-class probability that confirms full depth.
pub const SQUATTING_THRESHOLD: f32 = 0.90;

/// Guard thresholds for the phase transitions. All comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    pub starting: f32,
    pub middle: f32,
    pub squatting: f32,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            starting: STARTING_THRESHOLD,
            middle: MIDDLE_THRESHOLD,
            squatting: SQUATTING_THRESHOLD,
        }
    }
}

/// Progress through a single repetition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhaseState {
    #[default]
    Pending,
    Starting,
    Middle,
    Squatting,
}

/// The result of a finished rep attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepOutcome {
    Success,
    Failure,
}

/// Visual accent used to tint the pose overlay and capture border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorAccent {
    #[default]
    Neutral,
    Success,
    Failure,
}

impl ColorAccent {
    pub fn hex(self) -> &'static str {
        match self {
            ColorAccent::Neutral => "#9BD7D1",
            ColorAccent::Success => "#39E47E",
            ColorAccent::Failure => "#EE4A40",
        }
    }
}

impl RepOutcome {
    pub fn accent(self) -> ColorAccent {
        match self {
            RepOutcome::Success => ColorAccent::Success,
            RepOutcome::Failure => ColorAccent::Failure,
        }
    }
}

impl PhaseState {
    /// Applies the transition table to one probability vector.
    pub fn next(
        self,
        probabilities: &ProbabilityVector,
        thresholds: &PhaseThresholds,
    ) -> (PhaseState, Option<RepOutcome>) {
        let starting = probabilities.probability(PostureClass::Starting) > thresholds.starting;

        match self {
            PhaseState::Pending if starting => (PhaseState::Starting, None),
            PhaseState::Starting
                if probabilities.probability(PostureClass::Middle) > thresholds.middle =>
            {
                (PhaseState::Middle, None)
            }
            PhaseState::Middle
                if probabilities.probability(PostureClass::Squatting) > thresholds.squatting =>
            {
                (PhaseState::Squatting, None)
            }
            PhaseState::Middle if starting => (PhaseState::Pending, Some(RepOutcome::Failure)),
            PhaseState::Squatting if starting => (PhaseState::Pending, Some(RepOutcome::Success)),
            state => (state, None),
        }
    }
}

/// Owns the current phase of the rep in progress.
#[derive(Debug, Clone, Default)]
pub struct RepCounter {
    phase: PhaseState,
    thresholds: PhaseThresholds,
}

impl RepCounter {
    pub fn new(thresholds: PhaseThresholds) -> Self {
        Self {
            phase: PhaseState::Pending,
            thresholds,
        }
    }

    pub fn phase(&self) -> PhaseState {
        self.phase
    }

    /// Advances the phase for one frame and returns the finished rep, if any.
    pub fn observe(&mut self, probabilities: &ProbabilityVector) -> Option<RepOutcome> {
        let (next, outcome) = self.phase.next(probabilities, &self.thresholds);
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, ?outcome, "phase transition");
            self.phase = next;
        }
        outcome
    }
}
