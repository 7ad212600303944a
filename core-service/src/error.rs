use core_contracts::CoreError;
use core_merge::MergeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A core failed to become ready. It stays registered as faulted.
    #[error("Core initialization failed: {0}")]
    Initialization(String),

    #[error("Core instance already registered: {0}")]
    DuplicateCore(String),

    #[error("Core instance not found: {0}")]
    CoreNotFound(String),

    /// Every source of an aggregate operation failed; the caller may retry.
    #[error("Aggregate source failure: {0}")]
    AggregateSourceFailure(#[from] MergeError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Aggregator is shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn all_failed(errors: Vec<String>) -> Self {
        ServiceError::AggregateSourceFailure(MergeError::AggregateSourceFailure {
            attempted: errors.len(),
            errors,
        })
    }
}
