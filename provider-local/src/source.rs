//! Folder-backed [`FileSource`] using `tokio::fs`.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::{FileHandle, FileMetadata, FileSource};
use bytes::Bytes;
use core_metadata::playlist::is_playlist_extension;
use core_metadata::scanner::is_audio_extension;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;

/// A file on the local filesystem. Its id is the full path.
#[derive(Debug, Clone)]
pub struct LocalFile {
    id: String,
    name: String,
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: path.to_string_lossy().into_owned(),
            name,
            path,
        }
    }
}

fn unix_seconds(time: std::io::Result<SystemTime>) -> Option<i64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

#[async_trait]
impl FileHandle for LocalFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    async fn metadata(&self) -> Result<FileMetadata> {
        let metadata = fs::metadata(&self.path).await?;
        Ok(FileMetadata {
            size: metadata.len(),
            created_at: unix_seconds(metadata.created()),
            modified_at: unix_seconds(metadata.modified()),
            is_directory: metadata.is_dir(),
        })
    }

    async fn read_all(&self) -> Result<Bytes> {
        let data = fs::read(&self.path).await?;
        Ok(Bytes::from(data))
    }
}

/// Lists the audio and playlist files below a folder.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    recursive: bool,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
        }
    }

    /// Only list files directly inside the root folder.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_scannable(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| is_audio_extension(ext) || is_playlist_extension(ext))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FileSource for DirectorySource {
    fn label(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.to_string_lossy().into_owned())
    }

    /// Files sorted by path. Hidden entries are skipped.
    async fn list_files(&self) -> Result<Vec<Arc<dyn FileHandle>>> {
        if !fs::try_exists(&self.root).await? {
            return Err(BridgeError::NotFound(self.root.display().to_string()));
        }

        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(directory) = pending.pop() {
            let mut entries = fs::read_dir(&directory).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if hidden {
                    continue;
                }

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if self.recursive {
                        pending.push(path);
                    }
                } else if Self::is_scannable(&path) {
                    found.push(path);
                }
            }
        }

        found.sort();
        debug!(root = ?self.root, count = found.len(), "Listed folder");
        Ok(found
            .into_iter()
            .map(|path| Arc::new(LocalFile::new(path)) as Arc<dyn FileHandle>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fixture() -> PathBuf {
        let root = std::env::temp_dir().join(format!("local-source-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(root.join("Album/Disc 2")).await.unwrap();
        fs::create_dir_all(root.join(".cache")).await.unwrap();
        for file in [
            "intro.mp3",
            "notes.txt",
            "mix.m3u8",
            "Album/01.FLAC",
            "Album/cover.jpg",
            "Album/Disc 2/01.ogg",
            ".cache/hidden.mp3",
        ] {
            fs::write(root.join(file), b"data").await.unwrap();
        }
        root
    }

    fn names(files: &[Arc<dyn FileHandle>]) -> Vec<String> {
        files.iter().map(|f| f.name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_lists_audio_and_playlists_recursively() {
        let root = fixture().await;
        let files = DirectorySource::new(&root).list_files().await.unwrap();

        assert_eq!(names(&files), vec!["01.FLAC", "01.ogg", "intro.mp3", "mix.m3u8"]);
        assert_eq!(files[0].id(), root.join("Album/01.FLAC").to_string_lossy());
        assert_eq!(files[0].read_all().await.unwrap(), Bytes::from_static(b"data"));
        assert_eq!(files[0].metadata().await.unwrap().size, 4);

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_recursive() {
        let root = fixture().await;
        let files = DirectorySource::new(&root)
            .non_recursive()
            .list_files()
            .await
            .unwrap();

        assert_eq!(names(&files), vec!["intro.mp3", "mix.m3u8"]);
        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_root() {
        let source = DirectorySource::new("/definitely/not/here");
        assert!(matches!(
            source.list_files().await,
            Err(BridgeError::NotFound(_))
        ));
        assert_eq!(source.label(), "here");
    }
}
