// THEORY:
// The engine talks to four external collaborators: something that produces
// frames, a pose classifier, a feedback surface (audio, overlay, counters) and
// a document store for plans and finished workouts. Each one is a trait here so
// the session loop can be driven by a webcam, a recorded trace or a test script
// without changing a line of the core.

use crate::core_modules::countdown::CountdownKind;
use crate::core_modules::phase::{ColorAccent, RepOutcome};
use crate::core_modules::probability::ProbabilityVector;
use crate::core_modules::session::WorkoutPlan;
use crate::core_modules::summary::WorkoutSummaryRecord;
use crate::error::{ClassifierError, StoreError};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Whether frames are currently being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    Active,
    Paused,
}

/// Counters shown to the user after every rep and set change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub reps_remaining: u32,
    pub sets_remaining: u32,
    pub accuracy: i64,
    pub completed_reps: u32,
    pub total_sets: u32,
}

/// Produces video frames, one per scheduler tick.
pub trait FrameSource {
    type Frame;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> impl Future<Output = Option<Self::Frame>> + Send;

    /// Renders a frame. `None` is the plain passthrough view, `Some` draws the pose
    /// overlay in the given accent.
    fn present(&mut self, _frame: &Self::Frame, _accent: Option<ColorAccent>) {}
}

/// The pose-estimation model, treated as a black box.
pub trait FrameClassifier<F> {
    /// Number of classes in every output vector.
    fn class_count(&self) -> usize;

    fn classify(&mut self, frame: &F) -> impl Future<Output = Result<Vec<f32>, ClassifierError>> + Send;
}

/// Receives everything the user sees or hears. Calls are fire-and-forget.
pub trait FeedbackSink {
    fn on_rep_outcome(&mut self, outcome: RepOutcome);

    fn on_phase_visual(&mut self, accent: ColorAccent);

    fn on_metrics_update(&mut self, metrics: &MetricsSnapshot);

    fn on_class_probabilities(&mut self, _probabilities: &ProbabilityVector) {}

    fn on_countdown(&mut self, _kind: CountdownKind, _seconds_remaining: u32) {}

    fn on_degraded(&mut self, _consecutive_failures: u32) {}

    fn on_recovered(&mut self) {}

    fn on_loop_mode(&mut self, _mode: LoopMode) {}

    fn on_workout_complete(&mut self, _summary: &WorkoutSummaryRecord) {}
}

/// Read side of the stored workout preferences.
pub trait PreferenceStore {
    /// The user's plan, or `None` if they never configured one.
    fn workout_plan(&self, user_id: &str) -> impl Future<Output = Result<Option<WorkoutPlan>, StoreError>> + Send;
}

/// Write side for finished workouts.
pub trait PersistenceGateway {
    fn save_workout_summary(
        &self,
        user_id: &str,
        record: &WorkoutSummaryRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A `FrameSource` backed by any stream of frames.
pub struct StreamSource<St> {
    stream: St,
}

impl<St> StreamSource<St> {
    pub fn new(stream: St) -> Self {
        Self { stream }
    }
}

impl<St> FrameSource for StreamSource<St>
where
    St: Stream + Unpin + Send,
{
    type Frame = St::Item;

    fn next_frame(&mut self) -> impl Future<Output = Option<Self::Frame>> + Send {
        self.stream.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_source_yields_then_ends() {
        let mut source = StreamSource::new(futures::stream::iter(vec![1u8, 2, 3]));
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().await {
            source.present(&frame, None);
            frames.push(frame);
        }
        assert_eq!(frames, vec![1, 2, 3]);
    }
}
