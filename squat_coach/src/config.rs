//! Tunable behaviour of a coaching session.

use crate::core_modules::classifier_health::DEFAULT_DEGRADED_AFTER;
use crate::core_modules::phase::PhaseThresholds;
use crate::core_modules::summary::SQUAT_WORKOUT;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the coaching pipeline and its session loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Period of the frame scheduler. 16 ms is roughly one display refresh.
    pub frame_interval_ms: u64,
    /// Rest between sets, in seconds.
    pub rest_seconds: u32,
    /// Delay between pressing start and the first classified frame.
    pub start_countdown_seconds: u32,
    /// Consecutive malformed classifier outputs before the degraded signal.
    pub degraded_after: u32,
    /// Workout type written into summaries.
    pub workout_type: String,
    pub thresholds: PhaseThresholds,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            rest_seconds: 10,
            start_countdown_seconds: 5,
            degraded_after: DEFAULT_DEGRADED_AFTER,
            workout_type: SQUAT_WORKOUT.to_string(),
            thresholds: PhaseThresholds::default(),
        }
    }
}

impl CoachConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies `SQUAT_COACH_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { var, value })
        }

        if let Some(v) = lookup("SQUAT_COACH_FRAME_INTERVAL_MS") {
            self.frame_interval_ms = parse("SQUAT_COACH_FRAME_INTERVAL_MS", v)?;
        }
        if let Some(v) = lookup("SQUAT_COACH_REST_SECS") {
            self.rest_seconds = parse("SQUAT_COACH_REST_SECS", v)?;
        }
        if let Some(v) = lookup("SQUAT_COACH_START_COUNTDOWN_SECS") {
            self.start_countdown_seconds = parse("SQUAT_COACH_START_COUNTDOWN_SECS", v)?;
        }
        if let Some(v) = lookup("SQUAT_COACH_DEGRADED_AFTER") {
            self.degraded_after = parse("SQUAT_COACH_DEGRADED_AFTER", v)?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.degraded_after == 0 {
            return Err(ConfigError::Invalid("degraded_after must be at least 1".into()));
        }
        let t = &self.thresholds;
        for (name, value) in [("starting", t.starting), ("middle", t.middle), ("squatting", t.squatting)] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} threshold {value} must be in [0, 1)"
                )));
            }
        }
        Ok(())
    }
}
