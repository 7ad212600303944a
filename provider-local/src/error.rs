//! Error types for the local files core

use bridge_traits::error::BridgeError;
use core_contracts::CoreError;
use core_library::LibraryError;
use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocalFilesError {
    /// The folder could not be listed or a file could not be read
    #[error("File source error: {0}")]
    Source(#[from] BridgeError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Core is not loaded")]
    NotLoaded,
}

pub type Result<T> = std::result::Result<T, LocalFilesError>;

impl From<LocalFilesError> for CoreError {
    fn from(error: LocalFilesError) -> Self {
        match error {
            LocalFilesError::Cancelled => CoreError::Cancelled,
            LocalFilesError::NotLoaded => CoreError::Unsupported(error.to_string()),
            LocalFilesError::Library(LibraryError::NotFound { entity_type, id }) => {
                CoreError::NotFound(format!("{entity_type} {id}"))
            }
            other => CoreError::Source(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        assert_eq!(CoreError::from(LocalFilesError::Cancelled), CoreError::Cancelled);

        let error = LocalFilesError::Source(BridgeError::NotFound("/music".to_string()));
        assert_eq!(
            CoreError::from(error),
            CoreError::Source("File source error: File not found: /music".to_string())
        );
    }
}
