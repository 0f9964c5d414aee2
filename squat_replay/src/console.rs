//! Renders feedback events as console lines.

use squat_coach::FeedbackEvent;
use squat_coach::core_modules::countdown::CountdownKind;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// The console line for an event, or `None` for events not worth printing.
pub fn describe(event: &FeedbackEvent, show_labels: bool) -> Option<String> {
    let line = match event {
        FeedbackEvent::RepOutcome { outcome } => format!("rep: {outcome:?}"),
        FeedbackEvent::PhaseVisual { accent } => format!("overlay: {}", accent.hex()),
        FeedbackEvent::Metrics { metrics } => format!(
            "reps left {} | sets left {}/{} | completed {} | accuracy {}%",
            metrics.reps_remaining,
            metrics.sets_remaining,
            metrics.total_sets,
            metrics.completed_reps,
            metrics.accuracy
        ),
        FeedbackEvent::ClassLabels { labels } if show_labels => labels
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("  "),
        FeedbackEvent::ClassLabels { .. } => return None,
        FeedbackEvent::Countdown {
            kind,
            seconds_remaining,
        } => match kind {
            CountdownKind::Start => format!("starting in {seconds_remaining}s"),
            CountdownKind::Rest => format!("rest: {seconds_remaining}s"),
        },
        FeedbackEvent::Degraded {
            consecutive_failures,
        } => format!("classifier degraded after {consecutive_failures} bad outputs"),
        FeedbackEvent::Recovered => "classifier recovered".to_string(),
        FeedbackEvent::LoopMode { mode } => format!("loop: {mode:?}"),
        FeedbackEvent::WorkoutComplete { summary } => format!(
            "workout complete: {} reps x {} sets, accuracy {}%",
            summary.total_reps, summary.total_sets, summary.accuracy
        ),
    };
    Some(line)
}

/// Prints events until every sender is gone.
pub async fn print_events(mut events: broadcast::Receiver<FeedbackEvent>, show_labels: bool) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = describe(&event, show_labels) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "console fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squat_coach::core_modules::probability::ClassLabel;
    use squat_coach::{FeedbackBus, FeedbackSink, MetricsSnapshot, PostureClass};

    #[test]
    fn labels_are_opt_in() {
        let event = FeedbackEvent::ClassLabels {
            labels: vec![
                ClassLabel { class: PostureClass::Setup, percent: 5 },
                ClassLabel { class: PostureClass::Starting, percent: 93 },
            ],
        };
        assert_eq!(describe(&event, false), None);
        assert_eq!(describe(&event, true).unwrap(), "Setup: 5%  Starting: 93%");
    }

    #[test]
    fn metrics_line_shows_negative_accuracy() {
        let event = FeedbackEvent::Metrics {
            metrics: MetricsSnapshot {
                reps_remaining: 0,
                sets_remaining: 0,
                accuracy: -10,
                completed_reps: 0,
                total_sets: 1,
            },
        };
        assert_eq!(
            describe(&event, false).unwrap(),
            "reps left 0 | sets left 0/1 | completed 0 | accuracy -10%"
        );
    }

    #[tokio::test]
    async fn printer_stops_when_the_bus_is_dropped() {
        let mut bus = FeedbackBus::new(4);
        let printer = tokio::spawn(print_events(bus.subscribe(), false));
        bus.on_recovered();
        drop(bus);
        printer.await.unwrap();
    }
}
