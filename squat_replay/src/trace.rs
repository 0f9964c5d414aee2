//! Recorded classifier traces.
//!
//! A trace is a text file with one JSON array of class probabilities per line,
//! in frame order. Blank lines and lines starting with `#` are skipped. A line
//! that does not parse is kept as a failed frame, so replays exercise the same
//! malformed-output path a misbehaving model would.

use anyhow::{Context, Result};
use squat_coach::{ClassifierError, FrameClassifier};
use std::path::Path;

/// One recorded frame: the classifier output, or why the line was unusable.
pub type TraceFrame = Result<Vec<f32>, String>;

pub fn parse_trace(content: &str) -> Vec<TraceFrame> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str::<Vec<f32>>(line).map_err(|err| format!("line {}: {err}", index + 1))
        })
        .collect()
}

pub async fn load_trace(path: &Path) -> Result<Vec<TraceFrame>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    Ok(parse_trace(&content))
}

/// Plays back the outputs stored in each `TraceFrame`.
pub struct TraceClassifier {
    class_count: usize,
}

impl TraceClassifier {
    pub fn new(class_count: usize) -> Self {
        Self { class_count }
    }
}

impl FrameClassifier<TraceFrame> for TraceClassifier {
    fn class_count(&self) -> usize {
        self.class_count
    }

    async fn classify(&mut self, frame: &TraceFrame) -> Result<Vec<f32>, ClassifierError> {
        frame.clone().map_err(ClassifierError::failed)
    }
}
