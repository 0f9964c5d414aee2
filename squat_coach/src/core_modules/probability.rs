// THEORY:
// The `probability` module is the boundary between the opaque pose classifier and
// the rest of the engine. The classifier hands us a bare list of floats once per
// frame; this module turns that list into a `ProbabilityVector` whose shape is
// guaranteed: exactly one probability per `PostureClass`, each finite and inside
// [0, 1]. Nothing downstream ever indexes raw classifier output.
//
// Key architectural principles:
// 1.  **Fixed class identity**: the index of each class in the classifier output is
//     declared once, in `PostureClass::index`. Re-ordering the deployed model's
//     labels only ever touches this one mapping.
// 2.  **Validation, not repair**: malformed vectors are rejected with a precise
//     `ClassifierError`. They are never padded, clamped or renormalised.

use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};

/// Number of posture classes the state machine consumes.
pub const CLASS_COUNT: usize = 4;

/// The posture classes produced by the frame classifier, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostureClass {
    Setup,
    Starting,
    Middle,
    Squatting,
}

impl PostureClass {
    pub const ALL: [PostureClass; CLASS_COUNT] = [
        PostureClass::Setup,
        PostureClass::Starting,
        PostureClass::Middle,
        PostureClass::Squatting,
    ];

    /// Position of this class in the classifier output vector.
    pub const fn index(self) -> usize {
        match self {
            PostureClass::Setup => 0,
            PostureClass::Starting => 1,
            PostureClass::Middle => 2,
            PostureClass::Squatting => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PostureClass::Setup => "Setup",
            PostureClass::Starting => "Starting",
            PostureClass::Middle => "Middle",
            PostureClass::Squatting => "Squatting",
        }
    }
}

/// One validated classifier output: a probability for every `PostureClass`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityVector {
    probabilities: [f32; CLASS_COUNT],
}

/// A display label for one class, e.g. `Starting: 93%`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabel {
    pub class: PostureClass,
    pub percent: u32,
}

impl std::fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}%", self.class.label(), self.percent)
    }
}

impl ProbabilityVector {
    /// Validates raw classifier output.
    pub fn from_raw(raw: &[f32]) -> Result<Self, ClassifierError> {
        if raw.len() != CLASS_COUNT {
            return Err(ClassifierError::ClassCountMismatch {
                expected: CLASS_COUNT,
                actual: raw.len(),
            });
        }

        let mut probabilities = [0.0; CLASS_COUNT];
        for class in PostureClass::ALL {
            let value = raw[class.index()];
            if !value.is_finite() {
                return Err(ClassifierError::NonFinite { class });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(ClassifierError::OutOfRange { class, value });
            }
            probabilities[class.index()] = value;
        }

        Ok(Self { probabilities })
    }

    pub fn probability(&self, class: PostureClass) -> f32 {
        self.probabilities[class.index()]
    }

    /// Per-class labels with whole-number percentages.
    pub fn labels(&self) -> Vec<ClassLabel> {
        PostureClass::ALL
            .into_iter()
            .map(|class| ClassLabel {
                class,
                percent: (self.probability(class) * 100.0).round() as u32,
            })
            .collect()
    }
}
