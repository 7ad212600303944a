//! Metadata records produced by the file scanner.
//!
//! Records are plain serializable values keyed by a stable string id. Track
//! ids are derived from the file id, album and artist ids from normalized
//! names, so rescanning the same files yields the same ids.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

// =============================================================================
// Record ids
// =============================================================================

fn hashed_id(prefix: &str, input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest[..12].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{prefix}-{hex}")
}

/// Lower-cased, trimmed, whitespace-collapsed form of a name.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Track id for the file at `path` (or remote file id).
///
/// Backslashes are treated as forward slashes so playlist entries written on
/// Windows resolve to the same id.
pub fn track_id_for_path(path: &str) -> String {
    hashed_id("track", &path.replace('\\', "/"))
}

pub fn artist_id_for_name(name: &str) -> String {
    hashed_id("artist", &normalize_name(name))
}

/// Album id from its title and, when known, its album artist. Two albums
/// called "Greatest Hits" by different artists stay distinct.
pub fn album_id_for(title: &str, album_artist: Option<&str>) -> String {
    let artist = album_artist.map(normalize_name).unwrap_or_default();
    hashed_id("album", &format!("{}\u{1f}{}", normalize_name(title), artist))
}

pub fn playlist_id_for_path(path: &str) -> String {
    hashed_id("playlist", &path.replace('\\', "/"))
}

// =============================================================================
// Record trait
// =============================================================================

/// Record families stored by the repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Track => "track",
            RecordKind::Album => "album",
            RecordKind::Artist => "artist",
            RecordKind::Playlist => "playlist",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record a [`MetadataRepository`](crate::repositories::MetadataRepository) can store.
///
/// Only tracks carry disc and track numbers; other records keep insertion order.
pub trait MetadataRecord:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn disc_number(&self) -> Option<u32> {
        None
    }

    fn track_number(&self) -> Option<u32> {
        None
    }

    fn validate(&self) -> Result<(), String> {
        if self.id().trim().is_empty() {
            return Err(format!("{} id cannot be empty", Self::KIND));
        }
        Ok(())
    }
}

/// Sort key shared by every repository: disc number, then track number, then
/// insertion sequence. Missing numbers sort after present ones.
pub fn ordering_key<R: MetadataRecord>(record: &R, seq: u64) -> (bool, u32, bool, u32, u64) {
    let disc = record.disc_number();
    let track = record.track_number();
    (
        disc.is_none(),
        disc.unwrap_or(0),
        track.is_none(),
        track.unwrap_or(0),
        seq,
    )
}

// =============================================================================
// Records
// =============================================================================

/// Embedded picture found in a file's tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// SHA-256 of the picture bytes
    pub id: String,
    pub mime_type: Option<String>,
    /// Front cover, back cover, artist, ...
    pub picture_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub id: String,
    pub title: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration: Option<Duration>,
    pub artist_ids: Vec<String>,
    pub album_id: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<u32>,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub publisher: Option<String>,
    pub composer: Option<String>,
    pub comment: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    /// Id of the file within its source (full path for local files)
    pub source_file: Option<String>,
    pub images: Vec<ImageMetadata>,
    pub scanned_at: Option<DateTime<Utc>>,
}

impl MetadataRecord for TrackMetadata {
    const KIND: RecordKind = RecordKind::Track;

    fn id(&self) -> &str {
        &self.id
    }

    fn disc_number(&self) -> Option<u32> {
        self.disc_number
    }

    fn track_number(&self) -> Option<u32> {
        self.track_number
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumMetadata {
    pub id: String,
    pub title: Option<String>,
    /// Album artists, falling back to track artists when the tag is absent
    pub artist_ids: Vec<String>,
    pub track_ids: Vec<String>,
    pub genres: Vec<String>,
    pub year: Option<u32>,
    pub disc_count: Option<u32>,
    pub images: Vec<ImageMetadata>,
}

impl MetadataRecord for AlbumMetadata {
    const KIND: RecordKind = RecordKind::Album;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistMetadata {
    pub id: String,
    pub name: Option<String>,
    pub album_ids: Vec<String>,
    pub track_ids: Vec<String>,
    pub genres: Vec<String>,
}

impl MetadataRecord for ArtistMetadata {
    const KIND: RecordKind = RecordKind::Artist;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMetadata {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Entries in playlist order; ids may reference files that were not scanned
    pub track_ids: Vec<String>,
    pub source_file: Option<String>,
}

impl MetadataRecord for PlaylistMetadata {
    const KIND: RecordKind = RecordKind::Playlist;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Appends the values of `incoming` missing from `target`, keeping order.
pub fn union_into(target: &mut Vec<String>, incoming: &[String]) {
    for value in incoming {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_and_prefixed() {
        let a = track_id_for_path("/music/a.mp3");
        assert_eq!(a, track_id_for_path("/music/a.mp3"));
        assert!(a.starts_with("track-"));
        assert_eq!(a.len(), "track-".len() + 24);
        assert_ne!(a, track_id_for_path("/music/b.mp3"));
    }

    #[test]
    fn test_windows_separators_resolve_to_same_track() {
        assert_eq!(
            track_id_for_path("C:\\Music\\a.mp3"),
            track_id_for_path("C:/Music/a.mp3")
        );
    }

    #[test]
    fn test_artist_id_ignores_case_and_spacing() {
        assert_eq!(artist_id_for_name("Daft  Punk "), artist_id_for_name("daft punk"));
        assert_ne!(artist_id_for_name("Daft Punk"), artist_id_for_name("Justice"));
    }

    #[test]
    fn test_album_id_includes_artist() {
        let a = album_id_for("Greatest Hits", Some("Queen"));
        let b = album_id_for("Greatest Hits", Some("ABBA"));
        assert_ne!(a, b);
        assert_eq!(a, album_id_for("greatest hits", Some("QUEEN")));
    }

    #[test]
    fn test_ordering_key_puts_unnumbered_last() {
        let numbered = TrackMetadata {
            id: "t1".into(),
            disc_number: Some(2),
            track_number: Some(1),
            ..Default::default()
        };
        let unnumbered = TrackMetadata {
            id: "t2".into(),
            ..Default::default()
        };
        assert!(ordering_key(&numbered, 10) < ordering_key(&unnumbered, 0));
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let record = ArtistMetadata {
            id: "  ".into(),
            ..Default::default()
        };
        assert_eq!(record.validate(), Err("artist id cannot be empty".to_string()));
    }

    #[test]
    fn test_union_into_keeps_order() {
        let mut ids = vec!["a".to_string(), "b".to_string()];
        union_into(&mut ids, &["b".to_string(), "c".to_string()]);
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
