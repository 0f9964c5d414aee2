// THEORY:
// This file is the main entry point for the `squat_coach` library crate. It
// exposes the coaching engine as two layers:
//
// 1.  **`CoachPipeline`**: the synchronous session context. It takes one
//     classifier output per call and turns it into rep outcomes, set and workout
//     progress, accuracy and feedback callbacks. It never blocks and never spawns.
// 2.  **`SessionLoop`**: the async driver. It paces frames, owns the start and
//     rest countdowns, honours start/stop/cancel and hands the finished workout
//     to a `PersistenceGateway`.
//
// The pure building blocks (`core_modules`) stay public so callers can reuse the
// rep counter or the accuracy rule on their own, but most consumers only need
// the re-exports below.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod feedback;
pub mod interfaces;
pub mod pipeline;
pub mod session_loop;
pub mod stores;

pub use config::CoachConfig;
pub use core_modules::history::WorkoutHistory;
pub use core_modules::phase::{ColorAccent, PhaseState, RepCounter, RepOutcome};
pub use core_modules::probability::{PostureClass, ProbabilityVector};
pub use core_modules::session::{SessionCounters, SessionTracker, WorkoutPlan};
pub use core_modules::summary::WorkoutSummaryRecord;
pub use error::{ClassifierError, ConfigError, SessionError, StoreError};
pub use feedback::{FeedbackBus, FeedbackEvent};
pub use interfaces::{
    FeedbackSink, FrameClassifier, FrameSource, LoopMode, MetricsSnapshot, PersistenceGateway,
    PreferenceStore, StreamSource,
};
pub use pipeline::{CoachPipeline, TickReport};
pub use session_loop::{ControlHandle, SessionEnd, SessionLoop, control_channel};
