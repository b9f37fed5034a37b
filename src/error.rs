use thiserror::Error;

use crate::data::DataError;
use crate::device::DeviceKind;

/// Crate-level error type.
///
/// Every failure aborts the run; nothing in the training loop retries.
#[derive(Debug, Error)]
pub enum NnError {
    /// Error raised by the tensor library (kernels, autograd, optimizer).
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A tensor reached a stage with a shape that stage cannot accept.
    #[error("shape mismatch in {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Accuracy was requested over zero samples.
    #[error("cannot compute accuracy: evaluation split produced no samples")]
    EmptyEvaluation,

    /// The requested compute device could not be opened. There is no fallback.
    #[error("device {kind}:{ordinal} is unavailable: {source}")]
    DeviceUnavailable {
        kind: DeviceKind,
        ordinal: usize,
        #[source]
        source: candle_core::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, NnError>;
