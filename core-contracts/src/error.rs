use thiserror::Error;

/// Errors raised by a [`Core`](crate::Core) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The source is unreachable or misconfigured. The core is `Faulted`.
    #[error("Core initialization failed: {0}")]
    Initialization(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Operation cancelled")]
    Cancelled,

    /// A read from the underlying source failed.
    #[error("Source error: {0}")]
    Source(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
