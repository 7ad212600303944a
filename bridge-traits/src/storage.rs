//! Storage Abstractions
//!
//! Provides platform-agnostic traits for reading audio and playlist files
//! without binding the core to any OS storage API.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// An opened file handed to the metadata scanner.
///
/// Implementations wrap whatever the host uses to reach a file:
/// - Desktop: a path on the local filesystem
/// - iOS/Android: a security-scoped URL or SAF document
/// - Cloud cores: a downloaded blob kept in memory or a cache directory
///
/// The scanner only ever calls the methods below, so one handle must be safe to
/// read from a worker task while other handles are read concurrently.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileHandle;
///
/// async fn size_of(file: &dyn FileHandle) -> Result<u64> {
///     Ok(file.metadata().await?.size)
/// }
/// ```
#[async_trait]
pub trait FileHandle: Send + Sync {
    /// Stable identifier of the file within its source.
    ///
    /// For local files this is the full path; remote sources use their own
    /// file id. Record ids derived by the scanner are computed from it.
    fn id(&self) -> &str;

    /// File name including the extension.
    fn name(&self) -> &str;

    /// Local path, when the file lives on a filesystem the host can address.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Lower-cased extension without the dot.
    fn extension(&self) -> Option<String> {
        let name = self.name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Container-level properties (size, timestamps).
    async fn metadata(&self) -> Result<FileMetadata>;

    /// Read the entire file contents into memory.
    async fn read_all(&self) -> Result<Bytes>;
}

/// Enumerates the files a core should scan.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Human-readable label (folder path, account name, ...).
    fn label(&self) -> String;

    /// List every file currently reachable through this source.
    async fn list_files(&self) -> Result<Vec<Arc<dyn FileHandle>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemoryFile {
        name: String,
        data: Bytes,
    }

    #[async_trait]
    impl FileHandle for MemoryFile {
        fn id(&self) -> &str {
            &self.name
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn metadata(&self) -> Result<FileMetadata> {
            Ok(FileMetadata {
                size: self.data.len() as u64,
                ..Default::default()
            })
        }

        async fn read_all(&self) -> Result<Bytes> {
            Ok(self.data.clone())
        }
    }

    fn file(name: &str) -> MemoryFile {
        MemoryFile {
            name: name.to_string(),
            data: Bytes::from_static(b"ID3"),
        }
    }

    #[test]
    fn test_file_metadata() {
        let metadata = FileMetadata {
            size: 1024,
            created_at: Some(1234567890),
            modified_at: Some(1234567900),
            is_directory: false,
        };

        assert_eq!(metadata.size, 1024);
        assert!(!metadata.is_directory);
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(file("Song.MP3").extension(), Some("mp3".to_string()));
        assert_eq!(file("a.b.flac").extension(), Some("flac".to_string()));
    }

    #[test]
    fn test_extension_missing() {
        assert_eq!(file(".hidden").extension(), None);
        assert_eq!(file("README").extension(), None);
        assert_eq!(file("trailing.").extension(), None);
    }

    #[tokio::test]
    async fn test_read_through_trait_object() {
        let handle: Arc<dyn FileHandle> = Arc::new(file("intro.mp3"));
        let data = handle.read_all().await.unwrap();
        assert_eq!(&data[..], b"ID3");
        assert_eq!(handle.metadata().await.unwrap().size, 3);
        assert!(handle.path().is_none());
    }
}
