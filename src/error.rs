//! Error types for the GAN models and the adversarial trainer.

use std::fmt;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, GanError>;

/// The two halves of an adversarial training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discriminator,
    Generator,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Discriminator => f.write_str("discriminator"),
            Phase::Generator => f.write_str("generator"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GanError {
    /// An input tensor does not have the shape its consumer was configured for.
    #[error("input shape mismatch for {input}: expected {expected}, got {actual:?}")]
    InputShapeMismatch {
        input: &'static str,
        expected: String,
        actual: Vec<usize>,
    },

    /// A phase produced a NaN or infinite loss or score; its optimizer step was skipped.
    #[error("training diverged in the {phase} phase (non-finite value {value})")]
    DivergedTraining { phase: Phase, value: f32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GanError {
    pub(crate) fn shape_mismatch(input: &'static str, expected: String, actual: &[usize]) -> Self {
        GanError::InputShapeMismatch {
            input,
            expected,
            actual: actual.to_vec(),
        }
    }
}
