//! Error types for the squat_coach crate.

use thiserror::Error;

use crate::core_modules::probability::PostureClass;

/// Errors that stop a session from starting or continuing.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No workout plan is stored for the user.
    #[error("no preferences configured for user `{user_id}`")]
    NotConfigured {
        /// The user whose preferences were requested.
        user_id: String,
    },

    /// A stored plan has a zero rep or set count.
    #[error("invalid workout plan: {reps} reps x {sets} sets")]
    InvalidPlan {
        /// Reps per set.
        reps: u32,
        /// Sets per workout.
        sets: u32,
    },

    /// The classifier does not produce one probability per posture class.
    #[error("classifier reports {actual} classes, expected {expected}")]
    ClassCountMismatch {
        /// Number of classes the state machine consumes.
        expected: usize,
        /// Number of classes the classifier reports.
        actual: usize,
    },

    /// The preference store could not be read.
    #[error("preference store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// A classifier output that cannot be fed to the state machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    /// Wrong number of probabilities in the output vector.
    #[error("expected {expected} class probabilities, got {actual}")]
    ClassCountMismatch {
        /// Fixed class count.
        expected: usize,
        /// Length of the received vector.
        actual: usize,
    },

    /// NaN or infinite probability.
    #[error("probability for {class:?} is not finite")]
    NonFinite {
        /// The offending class.
        class: PostureClass,
    },

    /// Probability outside of [0, 1].
    #[error("probability {value} for {class:?} is outside [0, 1]")]
    OutOfRange {
        /// The offending class.
        class: PostureClass,
        /// The received value.
        value: f32,
    },

    /// The classifier itself failed to produce an output.
    #[error("classifier failed: {0}")]
    Failed(String),
}

impl ClassifierError {
    /// Creates a classifier failure error.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Failures reported by preference stores and persistence gateways.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialised.
    #[error("malformed document: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backend rejected the request.
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `CoachConfig`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override holds an unparsable value.
    #[error("invalid value `{value}` for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A value parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
