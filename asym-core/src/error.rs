//! Errors in the library.
use thiserror::Error;

/// Failures raised by the replay memory, the agents and the training loops.
///
/// Functions return [`anyhow::Result`]; callers that need to branch on the failure
/// kind downcast to this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsymError {
    /// Demonstrations alone do not fit into the memory.
    #[error("Capacity error: {demos} demonstrations exceed the capacity of {capacity}")]
    Capacity {
        /// Number of demonstrations after the rejected insertion.
        demos: usize,
        /// Capacity of the memory.
        capacity: usize,
    },

    /// An operation was called in a state that does not allow it.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Fewer eligible items than requested.
    #[error("Insufficient data: requested {requested}, available {available}")]
    InsufficientData {
        /// Requested batch size.
        requested: usize,
        /// Number of eligible items.
        available: usize,
    },

    /// Index outside the populated range.
    #[error("Index error: {ix} is out of range (len = {len})")]
    Index {
        /// Offending index.
        ix: usize,
        /// Number of populated items.
        len: usize,
    },

    /// Requested feature is not supported.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Dimension of an array does not match the expected one.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Name of the offending value.
        what: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// A precondition on the environment or the configuration is violated.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Collective communication failed.
    #[error("Communication error: {0}")]
    Comm(String),

    /// Unknown noise specification.
    #[error("Unknown noise type: {0}")]
    UnknownNoise(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

impl AsymError {
    /// Shorthand for [`AsymError::ShapeMismatch`].
    pub fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}
