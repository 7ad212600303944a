use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Every source of a merged item failed the same lookup.
    #[error("All {attempted} sources failed: {}", errors.join("; "))]
    AggregateSourceFailure {
        attempted: usize,
        errors: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, MergeError>;
