//! # File Scanner
//!
//! Reads embedded tags from opened file handles and turns them into
//! [`FileMetadata`]: one track record plus album, artist and image records.
//!
//! ## Concurrency
//!
//! [`FileScanner::scan`] runs at most `degrees_of_parallelism` files at once.
//! Each file is its own task with its own buffers; tag parsing runs on the
//! blocking pool so a large file never stalls the async workers. Results come
//! back in input order regardless of completion order.
//!
//! ## Cancellation
//!
//! The token is checked before each file is enqueued and again when its task
//! starts. A file already being read is allowed to finish.

use bridge_traits::storage::FileHandle;
use bridge_traits::time::{Clock, SystemClock};
use core_library::models::{
    album_id_for, artist_id_for_name, track_id_for_path, AlbumMetadata, ArtistMetadata,
    ImageMetadata, TrackMetadata,
};
use core_runtime::config::{CoreConfig, DEFAULT_ARTIST_SEPARATORS};
use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artists::{normalize_text, split_artists};
use crate::error::{MetadataError, ScanError};
use crate::tags::{LoftyTagReader, RawTags, TagReader};

/// Extensions the scanner treats as audio.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "mp4", "aac", "ogg", "oga", "opus", "wav", "aiff", "aif", "ape", "wv",
    "mpc", "spx",
];

pub fn is_audio_extension(extension: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

/// Everything extracted from one audio file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub track: TrackMetadata,
    pub album: Option<AlbumMetadata>,
    /// One record per credited track artist, in tag order
    pub artists: Vec<ArtistMetadata>,
    /// Album artists not already credited on the track
    pub album_artists: Vec<ArtistMetadata>,
    pub images: Vec<ImageMetadata>,
}

/// Outcome of [`FileScanner::scan`].
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Files with usable metadata, in input order
    pub files: Vec<FileMetadata>,
    /// Files read successfully that carried no usable tags
    pub without_metadata: usize,
    pub errors: Vec<ScanError>,
    /// Files whose task ran to completion
    pub processed: usize,
    pub cancelled: bool,
}

enum UnitOutcome {
    Scanned(Result<Option<FileMetadata>, ScanError>),
    Skipped,
}

/// Concurrent tag scanner.
#[derive(Clone)]
pub struct FileScanner {
    reader: Arc<dyn TagReader>,
    artist_separators: Arc<[char]>,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
}

impl FileScanner {
    pub fn new(reader: Arc<dyn TagReader>) -> Self {
        Self {
            reader,
            artist_separators: Arc::from(DEFAULT_ARTIST_SEPARATORS),
            clock: Arc::new(SystemClock),
            events: None,
        }
    }

    /// Lofty-backed scanner using the configured artist separators.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(Arc::new(LoftyTagReader::new())).with_artist_separators(&config.artist_separators)
    }

    pub fn with_artist_separators(mut self, separators: &[char]) -> Self {
        self.artist_separators = Arc::from(separators);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish [`ScanEvent`]s on `bus` while scanning.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Scan one file.
    ///
    /// Returns `Ok(None)` when the file was read but has no title, no artist
    /// and no album.
    pub async fn scan_file(&self, file: &dyn FileHandle) -> Result<Option<FileMetadata>, ScanError> {
        let file_id = file.id().to_string();
        let data = file
            .read_all()
            .await
            .map_err(|e| ScanError::new(&file_id, e))?;

        let properties = match file.metadata().await {
            Ok(properties) => Some(properties),
            Err(e) => {
                debug!(file = %file_id, error = %e, "File properties unavailable");
                None
            }
        };

        let reader = Arc::clone(&self.reader);
        let name = file.name().to_string();
        let buffer = data.clone();
        let raw = tokio::task::spawn_blocking(move || reader.read(&name, &buffer))
            .await
            .map_err(|e| ScanError::new(&file_id, MetadataError::Task(e.to_string())))?
            .map_err(|e| ScanError::new(&file_id, e))?;

        let file_size = properties
            .as_ref()
            .map(|p| p.size)
            .unwrap_or(data.len() as u64);

        Ok(self.build(file, raw, file_size))
    }

    /// Scan `files` with at most `degrees_of_parallelism` in flight.
    ///
    /// Per-file failures are logged, recorded in the report and do not stop
    /// the scan.
    pub async fn scan(
        &self,
        files: Vec<Arc<dyn FileHandle>>,
        degrees_of_parallelism: usize,
        cancel: &CancellationToken,
    ) -> ScanReport {
        let total_files = files.len();
        let parallelism = degrees_of_parallelism.max(1);
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let mut report = ScanReport::default();

        info!(total_files, parallelism, "Starting metadata scan");
        self.emit(ScanEvent::Started {
            source: "files".to_string(),
            total_files,
        });

        let mut handles = Vec::with_capacity(total_files);
        for file in files {
            if cancel.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = cancel.cancelled() => break,
            };

            let scanner = self.clone();
            let unit_cancel = cancel.clone();
            let file_id = file.id().to_string();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                if unit_cancel.is_cancelled() {
                    return UnitOutcome::Skipped;
                }
                UnitOutcome::Scanned(scanner.scan_file(file.as_ref()).await)
            });
            handles.push((file_id, handle));
        }

        for (file_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => UnitOutcome::Scanned(Err(ScanError::new(
                    &file_id,
                    MetadataError::Task(e.to_string()),
                ))),
            };

            match outcome {
                UnitOutcome::Skipped => continue,
                UnitOutcome::Scanned(Ok(Some(metadata))) => report.files.push(metadata),
                UnitOutcome::Scanned(Ok(None)) => {
                    debug!(file = %file_id, "No usable metadata");
                    report.without_metadata += 1;
                }
                UnitOutcome::Scanned(Err(error)) => {
                    warn!(file = %error.file, error = %error.source, "Skipping file");
                    self.emit(ScanEvent::FileFailed {
                        file: error.file.clone(),
                        message: error.source.to_string(),
                    });
                    report.errors.push(error);
                }
            }

            report.processed += 1;
            self.emit(ScanEvent::Progress {
                processed: report.processed,
                total_files,
            });
        }

        report.cancelled = cancel.is_cancelled() && report.processed < total_files;
        if report.cancelled {
            info!(processed = report.processed, total_files, "Metadata scan cancelled");
            self.emit(ScanEvent::Cancelled {
                processed: report.processed,
            });
        } else {
            info!(
                scanned = report.files.len(),
                without_metadata = report.without_metadata,
                failed = report.errors.len(),
                "Metadata scan completed"
            );
            self.emit(ScanEvent::Completed {
                scanned: report.files.len(),
                without_metadata: report.without_metadata,
                failed: report.errors.len(),
            });
        }

        report
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Scan(event)).ok();
        }
    }

    fn build(&self, file: &dyn FileHandle, raw: RawTags, file_size: u64) -> Option<FileMetadata> {
        let separators = &self.artist_separators[..];
        let title = clean(raw.title.as_deref());
        let album_title = clean(raw.album.as_deref());
        let artist_names = split_artists(raw.artists.iter().map(String::as_str), separators);

        if title.is_none() && album_title.is_none() && artist_names.is_empty() {
            return None;
        }

        let album_artist_names =
            split_artists(raw.album_artists.iter().map(String::as_str), separators);
        let genres = split_artists(raw.genres.iter().map(String::as_str), separators);

        let track_id = track_id_for_path(file.id());
        let artist_ids: Vec<String> = artist_names.iter().map(|n| artist_id_for_name(n)).collect();

        let images: Vec<ImageMetadata> = raw
            .pictures
            .iter()
            .map(|picture| ImageMetadata {
                id: format!("{:x}", Sha256::digest(&picture.data)),
                mime_type: picture.mime_type.clone(),
                picture_type: picture.picture_type.clone(),
                size: picture.data.len(),
            })
            .collect();

        let album = album_title.map(|album_title| {
            let credited = if album_artist_names.is_empty() {
                &artist_names
            } else {
                &album_artist_names
            };
            AlbumMetadata {
                id: album_id_for(&album_title, credited.first().map(String::as_str)),
                title: Some(album_title),
                artist_ids: credited.iter().map(|n| artist_id_for_name(n)).collect(),
                track_ids: vec![track_id.clone()],
                genres: genres.clone(),
                year: raw.year,
                disc_count: raw.disc_total,
                images: images.clone(),
            }
        });
        let album_id = album.as_ref().map(|a| a.id.clone());

        let artist_record = |name: &String, with_track: bool| ArtistMetadata {
            id: artist_id_for_name(name),
            name: Some(name.clone()),
            album_ids: album_id.iter().cloned().collect(),
            track_ids: if with_track {
                vec![track_id.clone()]
            } else {
                Vec::new()
            },
            genres: genres.clone(),
        };

        let artists: Vec<ArtistMetadata> =
            artist_names.iter().map(|n| artist_record(n, true)).collect();
        let album_artists: Vec<ArtistMetadata> = album_artist_names
            .iter()
            .filter(|n| !artist_ids.contains(&artist_id_for_name(n)))
            .map(|n| artist_record(n, false))
            .collect();

        let track = TrackMetadata {
            id: track_id.clone(),
            title: title.or_else(|| file_stem(file.name())),
            track_number: raw.track_number,
            disc_number: raw.disc_number,
            duration: raw.properties.duration,
            artist_ids,
            album_id: album_id.clone(),
            genres,
            year: raw.year,
            bitrate: raw.properties.bitrate,
            sample_rate: raw.properties.sample_rate,
            channels: raw.properties.channels,
            publisher: clean(raw.publisher.as_deref()),
            composer: clean(raw.composer.as_deref()),
            comment: clean(raw.comment.as_deref()),
            mime_type: raw.mime_type,
            file_size: Some(file_size),
            source_file: Some(file.id().to_string()),
            images: images.clone(),
            scanned_at: Some(self.clock.now()),
        };

        Some(FileMetadata {
            track,
            album,
            artists,
            album_artists,
            images,
        })
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value.map(normalize_text).filter(|v| !v.is_empty())
}

fn file_stem(name: &str) -> Option<String> {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    clean(Some(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{AudioProperties, RawPicture};
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::FileMetadata as FileProperties;
    use bridge_traits::time::FixedClock;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::time::Duration;

    struct MemoryFile {
        id: String,
        name: String,
        data: Bytes,
    }

    #[async_trait]
    impl FileHandle for MemoryFile {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn metadata(&self) -> BridgeResult<FileProperties> {
            Ok(FileProperties {
                size: self.data.len() as u64,
                ..Default::default()
            })
        }

        async fn read_all(&self) -> BridgeResult<Bytes> {
            if self.data.is_empty() {
                return Err(BridgeError::OperationFailed("unreadable".to_string()));
            }
            Ok(self.data.clone())
        }
    }

    fn file(name: &str) -> Arc<dyn FileHandle> {
        Arc::new(MemoryFile {
            id: format!("/music/{name}"),
            name: name.to_string(),
            data: Bytes::copy_from_slice(name.as_bytes()),
        })
    }

    /// Returns canned tags keyed by file name.
    struct TableReader(HashMap<String, RawTags>);

    impl TagReader for TableReader {
        fn read(&self, name: &str, _data: &[u8]) -> crate::error::Result<RawTags> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| MetadataError::Parse(name.to_string()))
        }
    }

    fn scanner(entries: Vec<(&str, RawTags)>) -> FileScanner {
        let table = entries
            .into_iter()
            .map(|(name, tags)| (name.to_string(), tags))
            .collect();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        FileScanner::new(Arc::new(TableReader(table))).with_clock(Arc::new(clock))
    }

    fn tags(title: &str, artist: &str, album: &str) -> RawTags {
        RawTags {
            title: Some(title.to_string()),
            artists: vec![artist.to_string()],
            album: Some(album.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scan_file_builds_related_records() {
        let mut raw = tags("Song", "A; B", "Album");
        raw.album_artists = vec!["Various".to_string()];
        raw.track_number = Some(3);
        raw.properties = AudioProperties {
            duration: Some(Duration::from_secs(180)),
            bitrate: Some(320),
            ..Default::default()
        };
        raw.pictures = vec![RawPicture {
            data: Bytes::from_static(b"png"),
            mime_type: Some("image/png".to_string()),
            picture_type: "CoverFront".to_string(),
        }];
        let scanner = scanner(vec![("song.mp3", raw)]);

        let metadata = scanner
            .scan_file(file("song.mp3").as_ref())
            .await
            .unwrap()
            .unwrap();

        let track = &metadata.track;
        assert_eq!(track.id, track_id_for_path("/music/song.mp3"));
        assert_eq!(track.title.as_deref(), Some("Song"));
        assert_eq!(track.artist_ids.len(), 2);
        assert_eq!(track.duration, Some(Duration::from_secs(180)));
        assert_eq!(track.file_size, Some(8));
        assert!(track.scanned_at.is_some());
        assert_eq!(track.images.len(), 1);

        let album = metadata.album.unwrap();
        assert_eq!(track.album_id.as_deref(), Some(album.id.as_str()));
        assert_eq!(album.id, album_id_for("Album", Some("Various")));
        assert_eq!(album.track_ids, vec![track.id.clone()]);

        assert_eq!(metadata.artists.len(), 2);
        assert!(metadata.artists.iter().all(|a| a.track_ids == vec![track.id.clone()]));
        assert_eq!(metadata.album_artists.len(), 1);
        assert_eq!(metadata.album_artists[0].name.as_deref(), Some("Various"));
        assert!(metadata.album_artists[0].track_ids.is_empty());
    }

    #[tokio::test]
    async fn test_title_falls_back_to_file_name() {
        let raw = RawTags {
            artists: vec!["Someone".to_string()],
            ..Default::default()
        };
        let scanner = scanner(vec![("01 Intro.flac", raw)]);

        let metadata = scanner
            .scan_file(file("01 Intro.flac").as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metadata.track.title.as_deref(), Some("01 Intro"));
        assert!(metadata.album.is_none());
        assert!(metadata.artists[0].album_ids.is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_only_tags_count_as_missing() {
        let raw = RawTags {
            title: Some("   ".to_string()),
            artists: vec![" ; ".to_string()],
            genres: vec!["Rock".to_string()],
            ..Default::default()
        };
        let scanner = scanner(vec![("blank.mp3", raw)]);

        let result = scanner.scan_file(file("blank.mp3").as_ref()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_scan_error() {
        let scanner = scanner(vec![]);
        let empty: Arc<dyn FileHandle> = Arc::new(MemoryFile {
            id: "/music/empty.mp3".to_string(),
            name: "empty.mp3".to_string(),
            data: Bytes::new(),
        });

        let error = scanner.scan_file(empty.as_ref()).await.unwrap_err();
        assert_eq!(error.file, "/music/empty.mp3");
        assert!(matches!(error.source, MetadataError::Bridge(_)));
    }

    #[tokio::test]
    async fn test_scan_keeps_input_order_and_isolates_failures() {
        let scanner = scanner(vec![
            ("a.mp3", tags("A", "X", "Album")),
            ("c.mp3", tags("C", "X", "Album")),
            ("d.mp3", RawTags::default()),
        ]);
        let files = vec![file("a.mp3"), file("b.mp3"), file("c.mp3"), file("d.mp3")];

        let report = scanner.scan(files, 4, &CancellationToken::new()).await;

        let titles: Vec<_> = report
            .files
            .iter()
            .map(|f| f.track.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(report.without_metadata, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].file, "/music/b.mp3");
        assert_eq!(report.processed, 4);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_scan_publishes_events() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let scanner = scanner(vec![("a.mp3", tags("A", "X", "Y"))]).with_event_bus(bus);

        scanner
            .scan(vec![file("a.mp3")], 1, &CancellationToken::new())
            .await;

        let mut events = Vec::new();
        while let Ok(CoreEvent::Scan(event)) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ScanEvent::Started {
                    source: "files".to_string(),
                    total_files: 1
                },
                ScanEvent::Progress {
                    processed: 1,
                    total_files: 1
                },
                ScanEvent::Completed {
                    scanned: 1,
                    without_metadata: 0,
                    failed: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let scanner = scanner(vec![("a.mp3", tags("A", "X", "Y"))]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = scanner.scan(vec![file("a.mp3")], 2, &cancel).await;
        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_audio_extensions() {
        assert!(is_audio_extension("MP3"));
        assert!(is_audio_extension("flac"));
        assert!(!is_audio_extension("m3u"));
        assert!(!is_audio_extension("jpg"));
    }
}
