use thiserror::Error;

/// Errors surfaced by host storage implementations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The source exists but cannot be reached right now (unmounted volume,
    /// revoked permission).
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
