// THEORY:
// The `session_loop` module is the Classification Loop Driver. It replaces a
// self-rescheduling frame callback with one explicit task that owns the session
// context for the lifetime of a workout.
//
// Every iteration waits on exactly one of four things, checked in priority order:
// 1.  **Cancellation**: `ControlHandle::cancel`, or the handle being dropped. Ends
//     the loop and whatever countdown is running, with no further classification.
// 2.  **Start / stop**: the user toggling the session. Start runs the start
//     countdown first; stop pauses immediately.
// 3.  **Countdown tick**: one second of the start delay or of the rest between sets.
// 4.  **Frame tick**: the display-paced scheduler. A frame is pulled and presented
//     every tick. It is classified only while the loop is Active, and the next frame
//     is never requested before the previous classification has been applied.
//
// The loop is Active iff start was requested, no countdown is running and the
// workout is unfinished. Because countdowns and classification share this single
// task, no classification can race the rest countdown.

use crate::config::CoachConfig;
use crate::core_modules::countdown::{Countdown, CountdownKind};
use crate::core_modules::session::{SessionCounters, SessionProgress};
use crate::core_modules::summary::WorkoutSummaryRecord;
use crate::error::SessionError;
use crate::interfaces::{FeedbackSink, FrameClassifier, FrameSource, LoopMode, PersistenceGateway};
use crate::pipeline::{CoachPipeline, TickReport};
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// Every set was finished and the summary was handed to the gateway.
    Completed(WorkoutSummaryRecord),
    /// The session was stopped before the workout was finished.
    Cancelled(SessionCounters),
    /// The frame source ran dry before the workout was finished.
    SourceExhausted(SessionCounters),
}

/// User-facing controls for a running session loop.
#[derive(Clone)]
pub struct ControlHandle {
    play_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
}

impl ControlHandle {
    pub fn start(&self) {
        let _ = self.play_tx.send(true);
    }

    pub fn stop(&self) {
        let _ = self.play_tx.send(false);
    }

    /// Ends the session loop and any pending countdown.
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// The loop's end of the control channel.
pub struct LoopSignals {
    play_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

pub fn control_channel() -> (ControlHandle, LoopSignals) {
    let (play_tx, play_rx) = watch::channel(false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    (
        ControlHandle {
            play_tx,
            shutdown_tx,
        },
        LoopSignals {
            play_rx,
            shutdown_rx,
        },
    )
}

/// Resolves once cancel is requested or the `ControlHandle` is gone.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|cancelled| *cancelled).await;
}

async fn next_countdown_tick(countdown: &mut Option<Countdown>) -> u32 {
    match countdown {
        Some(countdown) => countdown.tick().await,
        None => std::future::pending().await,
    }
}

/// Drives frames from a source through the classifier into a `CoachPipeline`.
pub struct SessionLoop<S, C, F> {
    source: S,
    classifier: C,
    feedback: F,
    config: CoachConfig,
}

impl<S, C, F> SessionLoop<S, C, F>
where
    S: FrameSource,
    C: FrameClassifier<S::Frame>,
    F: FeedbackSink,
{
    pub fn new(source: S, classifier: C, feedback: F, config: CoachConfig) -> Self {
        Self {
            source,
            classifier,
            feedback,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    /// Runs one workout to completion, cancellation or source exhaustion.
    pub async fn run<P: PersistenceGateway>(
        &mut self,
        mut pipeline: CoachPipeline,
        gateway: &P,
        mut signals: LoopSignals,
    ) -> Result<SessionEnd, SessionError> {
        CoachPipeline::check_class_count(self.classifier.class_count())?;

        let mut frame_clock = interval(self.config.frame_interval());
        frame_clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut countdown: Option<Countdown> = None;
        let mut play_requested = *signals.play_rx.borrow_and_update();
        if play_requested {
            countdown = self.begin_countdown(CountdownKind::Start);
        }
        let mut mode = LoopMode::Paused;
        self.feedback.on_loop_mode(mode);
        self.feedback.on_metrics_update(&pipeline.metrics());

        loop {
            let next = if play_requested && countdown.is_none() && !pipeline.is_finished() {
                LoopMode::Active
            } else {
                LoopMode::Paused
            };
            if next != mode {
                debug!(?next, "loop mode changed");
                mode = next;
                self.feedback.on_loop_mode(mode);
            }

            tokio::select! {
                biased;

                () = shutdown_requested(&mut signals.shutdown_rx) => {
                    info!(counters = ?pipeline.counters(), "session cancelled");
                    return Ok(SessionEnd::Cancelled(*pipeline.counters()));
                }

                changed = signals.play_rx.changed() => {
                    if changed.is_err() {
                        return Ok(SessionEnd::Cancelled(*pipeline.counters()));
                    }
                    let requested = *signals.play_rx.borrow_and_update();
                    if requested == play_requested {
                        continue;
                    }
                    play_requested = requested;
                    if requested {
                        if countdown.is_none() {
                            countdown = self.begin_countdown(CountdownKind::Start);
                        }
                    } else if countdown.as_ref().is_some_and(|c| c.kind() == CountdownKind::Start) {
                        countdown = None;
                    }
                }

                remaining = next_countdown_tick(&mut countdown) => {
                    let kind = countdown.as_ref().map_or(CountdownKind::Rest, Countdown::kind);
                    self.feedback.on_countdown(kind, remaining);
                    if remaining == 0 {
                        countdown = None;
                        if kind == CountdownKind::Rest {
                            info!("rest over, starting next set");
                            pipeline.begin_next_set(&mut self.feedback);
                        }
                    }
                }

                _ = frame_clock.tick() => {
                    // A stalled source or classifier must not hold off cancel. Nothing
                    // is mutated before `process_output`, so the step can be dropped.
                    let next = tokio::select! {
                        biased;
                        () = shutdown_requested(&mut signals.shutdown_rx) => None,
                        frame = self.source.next_frame() => Some(frame),
                    };
                    let Some(next) = next else {
                        info!(counters = ?pipeline.counters(), "session cancelled while waiting for a frame");
                        return Ok(SessionEnd::Cancelled(*pipeline.counters()));
                    };
                    let Some(frame) = next else {
                        info!("frame source exhausted");
                        return Ok(SessionEnd::SourceExhausted(*pipeline.counters()));
                    };

                    if mode == LoopMode::Paused {
                        self.source.present(&frame, None);
                        continue;
                    }

                    let output = tokio::select! {
                        biased;
                        () = shutdown_requested(&mut signals.shutdown_rx) => None,
                        output = self.classifier.classify(&frame) => Some(output),
                    };
                    let Some(output) = output else {
                        info!(counters = ?pipeline.counters(), "session cancelled during classification");
                        return Ok(SessionEnd::Cancelled(*pipeline.counters()));
                    };
                    let report = pipeline.process_output(output, &mut self.feedback);
                    self.source.present(&frame, Some(pipeline.accent()));

                    if let TickReport::RepCounted { progress, .. } = report {
                        match progress {
                            SessionProgress::RepRecorded | SessionProgress::Resting => {}
                            SessionProgress::SetComplete { .. } => {
                                countdown = self.begin_countdown(CountdownKind::Rest);
                                if countdown.is_none() {
                                    pipeline.begin_next_set(&mut self.feedback);
                                }
                            }
                            SessionProgress::WorkoutComplete => {
                                return Ok(self.finish(&pipeline, gateway).await);
                            }
                        }
                    }
                }
            }
        }
    }

    fn begin_countdown(&mut self, kind: CountdownKind) -> Option<Countdown> {
        let seconds = match kind {
            CountdownKind::Start => self.config.start_countdown_seconds,
            CountdownKind::Rest => self.config.rest_seconds,
        };
        let countdown = Countdown::new(kind, seconds)?;
        self.feedback.on_countdown(kind, countdown.seconds_remaining());
        Some(countdown)
    }

    async fn finish<P: PersistenceGateway>(
        &mut self,
        pipeline: &CoachPipeline,
        gateway: &P,
    ) -> SessionEnd {
        let record = pipeline.finish(Utc::now());
        match gateway.save_workout_summary(pipeline.user_id(), &record).await {
            Ok(()) => info!(user_id = pipeline.user_id(), accuracy = record.accuracy, "workout saved"),
            Err(err) => warn!(user_id = pipeline.user_id(), error = %err, "failed to save workout summary"),
        }
        self.feedback.on_loop_mode(LoopMode::Paused);
        self.feedback.on_workout_complete(&record);
        SessionEnd::Completed(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::phase::{ColorAccent, RepOutcome};
    use crate::core_modules::session::WorkoutPlan;
    use crate::error::ClassifierError;
    use crate::feedback::{EventLog, FeedbackEvent};
    use crate::stores::InMemoryHistory;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    const STARTING: [f32; 4] = [0.02, 0.95, 0.02, 0.01];
    const MIDDLE: [f32; 4] = [0.0, 0.3, 0.6, 0.1];
    const SQUATTING: [f32; 4] = [0.0, 0.0, 0.05, 0.95];
    const IDLE: [f32; 4] = [1.0, 0.0, 0.0, 0.0];
    const SUCCESS_REP: [[f32; 4]; 4] = [STARTING, MIDDLE, SQUATTING, STARTING];

    struct CountingSource {
        produced: u64,
        limit: u64,
        presented: Vec<(u64, Option<ColorAccent>)>,
    }

    impl CountingSource {
        fn new(limit: u64) -> Self {
            Self {
                produced: 0,
                limit,
                presented: Vec::new(),
            }
        }

        fn passthrough_frames(&self) -> usize {
            self.presented.iter().filter(|(_, accent)| accent.is_none()).count()
        }
    }

    impl FrameSource for CountingSource {
        type Frame = u64;

        async fn next_frame(&mut self) -> Option<u64> {
            if self.produced >= self.limit {
                return None;
            }
            self.produced += 1;
            Some(self.produced)
        }

        fn present(&mut self, frame: &u64, accent: Option<ColorAccent>) {
            self.presented.push((*frame, accent));
        }
    }

    struct ScriptedClassifier {
        script: VecDeque<Vec<f32>>,
        class_count: usize,
        latency: Duration,
        calls: Vec<Instant>,
    }

    impl ScriptedClassifier {
        fn new(frames: &[[f32; 4]]) -> Self {
            Self {
                script: frames.iter().map(|f| f.to_vec()).collect(),
                class_count: 4,
                latency: Duration::ZERO,
                calls: Vec::new(),
            }
        }

        fn reps(count: usize) -> Self {
            let frames: Vec<[f32; 4]> = SUCCESS_REP.iter().copied().cycle().take(4 * count).collect();
            Self::new(&frames)
        }
    }

    impl FrameClassifier<u64> for ScriptedClassifier {
        fn class_count(&self) -> usize {
            self.class_count
        }

        async fn classify(&mut self, _frame: &u64) -> Result<Vec<f32>, ClassifierError> {
            self.calls.push(Instant::now());
            if !self.latency.is_zero() {
                sleep(self.latency).await;
            }
            Ok(self.script.pop_front().unwrap_or_else(|| IDLE.to_vec()))
        }
    }

    fn config() -> CoachConfig {
        CoachConfig {
            start_countdown_seconds: 0,
            ..CoachConfig::default()
        }
    }

    fn pipeline(reps: u32, sets: u32) -> CoachPipeline {
        CoachPipeline::new("ada", WorkoutPlan::new(reps, sets).unwrap(), &config())
    }

    type TestLoop = SessionLoop<CountingSource, ScriptedClassifier, EventLog>;

    fn session_loop(classifier: ScriptedClassifier, config: CoachConfig) -> TestLoop {
        SessionLoop::new(CountingSource::new(10_000), classifier, EventLog::default(), config)
    }

    #[tokio::test(start_paused = true)]
    async fn two_rep_workout_completes_and_saves_once() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut session = session_loop(ScriptedClassifier::reps(2), config());
        let end = session.run(pipeline(2, 1), &gateway, signals).await.unwrap();

        let SessionEnd::Completed(record) = end else {
            panic!("expected completion, got {end:?}");
        };
        assert_eq!((record.total_reps, record.total_sets), (2, 1));
        assert_eq!(record.accuracy, 100);
        assert_eq!(gateway.history("ada").records(), &[record.clone()]);
        assert_eq!(gateway.save_attempts(), 1);

        let log = session.feedback();
        assert_eq!(log.outcomes(), vec![RepOutcome::Success, RepOutcome::Success]);
        let metrics = log.last_metrics().unwrap();
        assert_eq!(metrics.completed_reps, 2);
        assert_eq!(metrics.reps_remaining, 0);
        assert_eq!(metrics.sets_remaining, 0);
        assert_eq!(
            log.count(|e| matches!(e, FeedbackEvent::WorkoutComplete { .. })),
            1
        );
        assert_eq!(session.classifier().calls.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn rest_between_sets_blocks_classification() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut session = session_loop(ScriptedClassifier::reps(2), config());
        let end = session.run(pipeline(1, 2), &gateway, signals).await.unwrap();
        assert!(matches!(end, SessionEnd::Completed(_)));

        let calls = &session.classifier().calls;
        assert_eq!(calls.len(), 8);
        let set_finished_at = calls[3];
        let next_classification = calls[4];
        assert!(next_classification - set_finished_at >= Duration::from_secs(10));

        // Frames kept flowing during the rest, unclassified.
        assert!(session.source().passthrough_frames() > 500);

        let rest_ticks = session.feedback().count(|e| {
            matches!(e, FeedbackEvent::Countdown { kind: CountdownKind::Rest, .. })
        });
        assert_eq!(rest_ticks, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_rest_stops_everything() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut session = session_loop(ScriptedClassifier::reps(2), config());
        let started = Instant::now();
        let (end, ()) = tokio::join!(session.run(pipeline(1, 2), &gateway, signals), async {
            sleep(Duration::from_secs(3)).await;
            control.cancel();
        });

        let SessionEnd::Cancelled(counters) = end.unwrap() else {
            panic!("expected cancellation");
        };
        assert_eq!(counters.sets_remaining, 1);
        assert_eq!(counters.reps_remaining_in_set, 0);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(gateway.history("ada").is_empty());
        assert_eq!(session.classifier().calls.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_control_handle_cancels() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut session = session_loop(ScriptedClassifier::new(&[]), config());
        let (end, ()) = tokio::join!(session.run(pipeline(5, 1), &gateway, signals), async move {
            sleep(Duration::from_millis(500)).await;
            drop(control);
        });

        assert!(matches!(end.unwrap(), SessionEnd::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn paused_loop_only_presents_passthrough_frames() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();

        let mut session = session_loop(ScriptedClassifier::reps(1), config());
        let (end, ()) = tokio::join!(session.run(pipeline(1, 1), &gateway, signals), async {
            sleep(Duration::from_secs(1)).await;
            control.cancel();
        });

        assert!(matches!(end.unwrap(), SessionEnd::Cancelled(_)));
        assert!(session.classifier().calls.is_empty());
        assert!(session.source().passthrough_frames() > 0);
        assert_eq!(session.source().passthrough_frames(), session.source().presented.len());
    }

    #[tokio::test(start_paused = true)]
    async fn start_countdown_delays_classification() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        let config = CoachConfig {
            start_countdown_seconds: 5,
            ..CoachConfig::default()
        };

        let mut session = session_loop(ScriptedClassifier::reps(1), config);
        let started = Instant::now();
        control.start();
        let end = session.run(pipeline(1, 1), &gateway, signals).await.unwrap();

        assert!(matches!(end, SessionEnd::Completed(_)));
        assert!(session.classifier().calls[0] - started >= Duration::from_secs(5));
        let start_ticks = session.feedback().count(|e| {
            matches!(e, FeedbackEvent::Countdown { kind: CountdownKind::Start, .. })
        });
        assert_eq!(start_ticks, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_start_countdown_keeps_loop_paused() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        let config = CoachConfig {
            start_countdown_seconds: 5,
            ..CoachConfig::default()
        };
        control.start();

        let mut session = session_loop(ScriptedClassifier::reps(1), config);
        let (end, ()) = tokio::join!(session.run(pipeline(1, 1), &gateway, signals), async {
            sleep(Duration::from_millis(2500)).await;
            control.stop();
            sleep(Duration::from_secs(10)).await;
            control.cancel();
        });

        assert!(matches!(end.unwrap(), SessionEnd::Cancelled(_)));
        assert!(session.classifier().calls.is_empty());
        assert!(!session.feedback().events.contains(&FeedbackEvent::LoopMode { mode: LoopMode::Active }));
    }

    #[tokio::test(start_paused = true)]
    async fn one_classification_in_flight_at_a_time() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut classifier = ScriptedClassifier::reps(1);
        classifier.latency = Duration::from_millis(50);
        let mut session = session_loop(classifier, config());
        session.run(pipeline(1, 1), &gateway, signals).await.unwrap();

        let calls = &session.classifier().calls;
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_still_completes() {
        let gateway = InMemoryHistory::rejecting();
        let (control, signals) = control_channel();
        control.start();

        let mut session = session_loop(ScriptedClassifier::reps(1), config());
        let end = session.run(pipeline(1, 1), &gateway, signals).await.unwrap();
        assert!(matches!(end, SessionEnd::Completed(_)));
        assert_eq!(gateway.save_attempts(), 1);
        assert_eq!(
            session.feedback().count(|e| matches!(e, FeedbackEvent::WorkoutComplete { .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_a_slow_classification() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut classifier = ScriptedClassifier::reps(1);
        classifier.latency = Duration::from_secs(30);
        let mut session = session_loop(classifier, config());
        let started = Instant::now();
        let (end, ()) = tokio::join!(session.run(pipeline(1, 1), &gateway, signals), async {
            sleep(Duration::from_secs(1)).await;
            control.cancel();
        });

        let SessionEnd::Cancelled(counters) = end.unwrap() else {
            panic!("expected cancellation");
        };
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(counters.completed_rep_count, 0);
        assert_eq!(session.classifier().calls.len(), 1);
        assert_eq!(
            session.feedback().count(|e| matches!(e, FeedbackEvent::ClassLabels { .. })),
            0
        );
    }

    struct StalledSource;

    impl FrameSource for StalledSource {
        type Frame = u64;

        async fn next_frame(&mut self) -> Option<u64> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_a_stalled_source() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut session = SessionLoop::new(
            StalledSource,
            ScriptedClassifier::reps(1),
            EventLog::default(),
            config(),
        );
        let started = Instant::now();
        let (end, ()) = tokio::join!(session.run(pipeline(1, 1), &gateway, signals), async move {
            sleep(Duration::from_millis(500)).await;
            drop(control);
        });

        assert!(matches!(end.unwrap(), SessionEnd::Cancelled(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(session.classifier().calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_source_ends_the_session() {
        let gateway = InMemoryHistory::new();
        let (control, signals) = control_channel();
        control.start();

        let mut session = SessionLoop::new(
            CountingSource::new(3),
            ScriptedClassifier::reps(1),
            EventLog::default(),
            config(),
        );
        let end = session.run(pipeline(1, 1), &gateway, signals).await.unwrap();
        let SessionEnd::SourceExhausted(counters) = end else {
            panic!("expected exhaustion");
        };
        assert_eq!(counters.completed_rep_count, 0);
        assert_eq!(session.classifier().calls.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_classifier_is_rejected_before_any_frame() {
        let gateway = InMemoryHistory::new();
        let (_control, signals) = control_channel();

        let mut classifier = ScriptedClassifier::reps(1);
        classifier.class_count = 3;
        let mut session = session_loop(classifier, config());
        let err = session.run(pipeline(1, 1), &gateway, signals).await.unwrap_err();

        assert!(matches!(err, SessionError::ClassCountMismatch { expected: 4, actual: 3 }));
        assert!(session.source().presented.is_empty());
    }
}
