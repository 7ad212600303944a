use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    /// The container or its tags could not be parsed.
    #[error("Failed to parse tags: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Tag reader task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

/// A single file could not be scanned. The scan skips it and continues.
#[derive(Error, Debug)]
#[error("Failed to scan {file}: {source}")]
pub struct ScanError {
    /// File id as reported by its handle
    pub file: String,
    #[source]
    pub source: MetadataError,
}

impl ScanError {
    pub fn new(file: impl Into<String>, source: impl Into<MetadataError>) -> Self {
        Self {
            file: file.into(),
            source: source.into(),
        }
    }
}
