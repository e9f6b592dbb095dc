use thiserror::Error;

/// Failure of an observed (or raw) operation.
///
/// Write-like operations return these instead of panicking; the graph is
/// left exactly as it was when an operation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    #[error("change at `{path}` was rejected by the validator")]
    Rejected { path: String },
    #[error("property `{key}` is read-only")]
    ReadOnly { key: String },
    #[error("property `{key}` is not configurable")]
    NotConfigurable { key: String },
    #[error("cannot redefine property `{key}`")]
    Redefine { key: String },
    #[error("`{method}` is not a function")]
    NotCallable { method: String },
    #[error("cannot {operation} on a primitive value")]
    NotAnObject { operation: &'static str },
    #[error("invalid value used as weak collection key")]
    InvalidWeakKey,
    #[error("invalid array length")]
    InvalidLength,
    /// Raised by user-supplied functions.
    #[error("{0}")]
    Thrown(String),
}

impl ObserveError {
    pub fn thrown(message: impl Into<String>) -> Self {
        ObserveError::Thrown(message.into())
    }
}
