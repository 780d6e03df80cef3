use thiserror::Error;

use crate::value::DType;

/// Errors surfaced by every table, grouping, reshape and resample operation
#[derive(Error, Debug)]
pub enum Error {
    #[error("label not found: {0}")]
    KeyNotFound(String),

    #[error("label is not unique: {0}")]
    DuplicateLabel(String),

    #[error("index must be monotonically increasing: {0}")]
    UnsortedIndex(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("duplicate entry for key {0}")]
    DuplicateKey(String),

    #[error("type mismatch: cannot {op} {left:?} and {right:?}")]
    TypeMismatch {
        op: String,
        left: DType,
        right: DType,
    },

    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("index out of bounds: index {index}, size {size}")]
    IndexOutOfBounds { index: usize, size: usize },

    #[error("length mismatch: expected {expected}, actual {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error")]
    Json(#[source] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::TypeMismatch`] with a named operation
    pub fn type_mismatch(op: impl Into<String>, left: DType, right: DType) -> Self {
        Error::TypeMismatch {
            op: op.into(),
            left,
            right,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
