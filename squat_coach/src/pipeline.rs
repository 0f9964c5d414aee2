// THEORY:
// The `pipeline` module is the top-level synchronous API of the coaching engine.
// It owns the whole session context (rep counter, session tracker, classifier
// health, current accent) and exposes a single per-frame step that takes raw
// classifier output and pushes the results through every layer:
//
//     raw output -> validation -> rep counter -> session tracker -> feedback
//
// The step never waits on anything, never owns a timer and never touches the
// network. Scheduling, rest periods and persistence are the session loop's job;
// the pipeline only reports what happened through a `TickReport`.

use crate::config::CoachConfig;
use crate::core_modules::classifier_health::{ClassifierHealth, HealthSignal};
use crate::core_modules::phase::{ColorAccent, PhaseState, RepCounter, RepOutcome};
use crate::core_modules::probability::{CLASS_COUNT, ProbabilityVector};
use crate::core_modules::session::{SessionCounters, SessionProgress, SessionTracker, WorkoutPlan};
use crate::core_modules::summary::WorkoutSummaryRecord;
use crate::error::{ClassifierError, SessionError};
use crate::interfaces::{FeedbackSink, MetricsSnapshot, PreferenceStore};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// What a single frame did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// The output was valid but no guard matched.
    NoTransition,
    /// The phase moved without finishing a rep.
    PhaseAdvanced(PhaseState),
    /// A rep attempt finished.
    RepCounted {
        outcome: RepOutcome,
        progress: SessionProgress,
    },
    /// The output was rejected and the frame ignored.
    Malformed(ClassifierError),
}

/// The session context for one workout.
pub struct CoachPipeline {
    user_id: String,
    workout_type: String,
    counter: RepCounter,
    tracker: SessionTracker,
    health: ClassifierHealth,
    accent: ColorAccent,
}

impl CoachPipeline {
    pub fn new(user_id: impl Into<String>, plan: WorkoutPlan, config: &CoachConfig) -> Self {
        Self {
            user_id: user_id.into(),
            workout_type: config.workout_type.clone(),
            counter: RepCounter::new(config.thresholds),
            tracker: SessionTracker::new(plan),
            health: ClassifierHealth::new(config.degraded_after),
            accent: ColorAccent::Neutral,
        }
    }

    /// Loads the user's plan and opens a session. Fails closed without a plan.
    pub async fn start<P: PreferenceStore>(
        user_id: &str,
        store: &P,
        config: &CoachConfig,
    ) -> Result<Self, SessionError> {
        let plan = store
            .workout_plan(user_id)
            .await?
            .ok_or_else(|| SessionError::NotConfigured {
                user_id: user_id.to_string(),
            })?;

        info!(
            user_id,
            reps = plan.total_reps(),
            sets = plan.total_sets(),
            "session started"
        );
        Ok(Self::new(user_id, plan, config))
    }

    /// Rejects classifiers whose class count does not match the state machine.
    pub fn check_class_count(class_count: usize) -> Result<(), SessionError> {
        if class_count != CLASS_COUNT {
            return Err(SessionError::ClassCountMismatch {
                expected: CLASS_COUNT,
                actual: class_count,
            });
        }
        Ok(())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn plan(&self) -> &WorkoutPlan {
        self.tracker.plan()
    }

    pub fn phase(&self) -> PhaseState {
        self.counter.phase()
    }

    pub fn counters(&self) -> &SessionCounters {
        self.tracker.counters()
    }

    pub fn accuracy(&self) -> i64 {
        self.tracker.current_accuracy()
    }

    pub fn accent(&self) -> ColorAccent {
        self.accent
    }

    pub fn is_finished(&self) -> bool {
        self.tracker.is_finished()
    }

    pub fn is_degraded(&self) -> bool {
        self.health.is_degraded()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let counters = self.tracker.counters();
        MetricsSnapshot {
            reps_remaining: counters.reps_remaining_in_set,
            sets_remaining: counters.sets_remaining,
            accuracy: self.tracker.current_accuracy(),
            completed_reps: counters.completed_rep_count,
            total_sets: self.tracker.plan().total_sets(),
        }
    }

    /// Runs one classified frame through the session.
    pub fn process_output<F: FeedbackSink>(
        &mut self,
        output: Result<Vec<f32>, ClassifierError>,
        feedback: &mut F,
    ) -> TickReport {
        // Between sets and after the last one, frames are not counted.
        if self.is_finished() || self.tracker.is_resting() {
            return TickReport::NoTransition;
        }

        let probabilities = match output.and_then(|raw| ProbabilityVector::from_raw(&raw)) {
            Ok(probabilities) => probabilities,
            Err(err) => {
                warn!(error = %err, "ignoring classifier output");
                if let Some(HealthSignal::Degraded { consecutive_failures }) = self.health.record_failure() {
                    feedback.on_degraded(consecutive_failures);
                }
                return TickReport::Malformed(err);
            }
        };

        if let Some(HealthSignal::Recovered) = self.health.record_success() {
            info!("classifier recovered");
            feedback.on_recovered();
        }
        feedback.on_class_probabilities(&probabilities);

        let before = self.counter.phase();
        let Some(outcome) = self.counter.observe(&probabilities) else {
            let after = self.counter.phase();
            return if after == before {
                TickReport::NoTransition
            } else {
                TickReport::PhaseAdvanced(after)
            };
        };

        let progress = self.tracker.on_rep_outcome(outcome);
        self.accent = outcome.accent();
        feedback.on_rep_outcome(outcome);
        feedback.on_phase_visual(self.accent);
        feedback.on_metrics_update(&self.metrics());

        TickReport::RepCounted { outcome, progress }
    }

    /// Refills reps after the rest between sets.
    pub fn begin_next_set<F: FeedbackSink>(&mut self, feedback: &mut F) {
        self.tracker.begin_next_set();
        feedback.on_metrics_update(&self.metrics());
    }

    pub fn finish(&self, timestamp: DateTime<Utc>) -> WorkoutSummaryRecord {
        self.tracker.summary(&self.workout_type, timestamp)
    }
}
