//! Broadcast fan-out for feedback events.
//!
//! `FeedbackBus` implements [`FeedbackSink`] by publishing every callback as a
//! [`FeedbackEvent`] on a tokio broadcast channel, so audio, overlay and counter
//! renderers can subscribe independently of the session loop.

use crate::core_modules::countdown::CountdownKind;
use crate::core_modules::phase::{ColorAccent, RepOutcome};
use crate::core_modules::probability::ClassLabel;
use crate::core_modules::probability::ProbabilityVector;
use crate::core_modules::summary::WorkoutSummaryRecord;
use crate::interfaces::{FeedbackSink, LoopMode, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One feedback callback, as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedbackEvent {
    RepOutcome { outcome: RepOutcome },
    PhaseVisual { accent: ColorAccent },
    Metrics { metrics: MetricsSnapshot },
    ClassLabels { labels: Vec<ClassLabel> },
    Countdown { kind: CountdownKind, seconds_remaining: u32 },
    Degraded { consecutive_failures: u32 },
    Recovered,
    LoopMode { mode: LoopMode },
    WorkoutComplete { summary: WorkoutSummaryRecord },
}

#[derive(Clone)]
pub struct FeedbackBus {
    pub events_tx: broadcast::Sender<FeedbackEvent>,
}

impl FeedbackBus {
    pub fn new(capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel::<FeedbackEvent>(capacity.max(1));
        Self { events_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.events_tx.subscribe()
    }

    fn publish(&self, event: FeedbackEvent) {
        // No subscribers is fine: feedback is fire-and-forget.
        let _ = self.events_tx.send(event);
    }
}

impl FeedbackSink for FeedbackBus {
    fn on_rep_outcome(&mut self, outcome: RepOutcome) {
        self.publish(FeedbackEvent::RepOutcome { outcome });
    }

    fn on_phase_visual(&mut self, accent: ColorAccent) {
        self.publish(FeedbackEvent::PhaseVisual { accent });
    }

    fn on_metrics_update(&mut self, metrics: &MetricsSnapshot) {
        self.publish(FeedbackEvent::Metrics { metrics: *metrics });
    }

    fn on_class_probabilities(&mut self, probabilities: &ProbabilityVector) {
        self.publish(FeedbackEvent::ClassLabels {
            labels: probabilities.labels(),
        });
    }

    fn on_countdown(&mut self, kind: CountdownKind, seconds_remaining: u32) {
        self.publish(FeedbackEvent::Countdown {
            kind,
            seconds_remaining,
        });
    }

    fn on_degraded(&mut self, consecutive_failures: u32) {
        self.publish(FeedbackEvent::Degraded {
            consecutive_failures,
        });
    }

    fn on_recovered(&mut self) {
        self.publish(FeedbackEvent::Recovered);
    }

    fn on_loop_mode(&mut self, mode: LoopMode) {
        self.publish(FeedbackEvent::LoopMode { mode });
    }

    fn on_workout_complete(&mut self, summary: &WorkoutSummaryRecord) {
        self.publish(FeedbackEvent::WorkoutComplete {
            summary: summary.clone(),
        });
    }
}

/// Collects events in memory. Handy for tests and trace dumps.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<FeedbackEvent>,
}

impl EventLog {
    pub fn outcomes(&self) -> Vec<RepOutcome> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FeedbackEvent::RepOutcome { outcome } => Some(*outcome),
                _ => None,
            })
            .collect()
    }

    pub fn last_metrics(&self) -> Option<MetricsSnapshot> {
        self.events.iter().rev().find_map(|e| match e {
            FeedbackEvent::Metrics { metrics } => Some(*metrics),
            _ => None,
        })
    }

    pub fn count(&self, predicate: impl Fn(&FeedbackEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

impl FeedbackSink for EventLog {
    fn on_rep_outcome(&mut self, outcome: RepOutcome) {
        self.events.push(FeedbackEvent::RepOutcome { outcome });
    }

    fn on_phase_visual(&mut self, accent: ColorAccent) {
        self.events.push(FeedbackEvent::PhaseVisual { accent });
    }

    fn on_metrics_update(&mut self, metrics: &MetricsSnapshot) {
        self.events.push(FeedbackEvent::Metrics { metrics: *metrics });
    }

    fn on_countdown(&mut self, kind: CountdownKind, seconds_remaining: u32) {
        self.events.push(FeedbackEvent::Countdown {
            kind,
            seconds_remaining,
        });
    }

    fn on_degraded(&mut self, consecutive_failures: u32) {
        self.events.push(FeedbackEvent::Degraded {
            consecutive_failures,
        });
    }

    fn on_recovered(&mut self) {
        self.events.push(FeedbackEvent::Recovered);
    }

    fn on_loop_mode(&mut self, mode: LoopMode) {
        self.events.push(FeedbackEvent::LoopMode { mode });
    }

    fn on_workout_complete(&mut self, summary: &WorkoutSummaryRecord) {
        self.events.push(FeedbackEvent::WorkoutComplete {
            summary: summary.clone(),
        });
    }
}
