//! Identity functions per item kind.
//!
//! Two items from different core instances are the same logical item when
//! their [`MergeKind::key`]s are equal and [`MergeKind::is_same`] holds:
//!
//! | Kind | Key | Extra condition |
//! |------|-----|-----------------|
//! | Track | normalized name | durations within tolerance when both known; a shared artist when both list artists |
//! | Album | normalized name | a shared artist when both list artists |
//! | Artist | normalized name | none |
//! | Playlist | normalized name | none |
//! | Image | URI | none |
//!
//! Names are normalized by trimming, collapsing whitespace runs to one space
//! and lower-casing (Unicode aware).

use core_contracts::{
    CoreAlbum, CoreArtist, CoreImage, CoreItem, CorePlaylist, CoreTrack, SourceRef,
};
use core_runtime::config::{CoreConfig, DEFAULT_DUPLICATE_DURATION_TOLERANCE};
use std::time::Duration;

/// Trimmed, whitespace-collapsed, lower-cased form used for name matching.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Merge rules for one item type.
pub trait MergeKind: Send + Sync {
    type Item: CoreItem + PartialEq;

    /// Bucket key. Items with different keys are never merged.
    fn key(&self, item: &Self::Item) -> String;

    fn source<'a>(&self, item: &'a Self::Item) -> &'a SourceRef {
        item.source()
    }

    /// Finer identity check between two items with equal keys.
    fn is_same(&self, a: &Self::Item, b: &Self::Item) -> bool {
        self.key(a) == self.key(b)
    }
}

fn share_artist(a: &[String], b: &[String]) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    let left: Vec<String> = a.iter().map(|n| normalize_name(n)).collect();
    b.iter().any(|n| left.contains(&normalize_name(n)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackMerge {
    pub duration_tolerance: Duration,
}

impl TrackMerge {
    pub fn new(duration_tolerance: Duration) -> Self {
        Self { duration_tolerance }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.duplicate_duration_tolerance)
    }
}

impl Default for TrackMerge {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_DURATION_TOLERANCE)
    }
}

impl MergeKind for TrackMerge {
    type Item = CoreTrack;

    fn key(&self, item: &CoreTrack) -> String {
        normalize_name(&item.name)
    }

    fn is_same(&self, a: &CoreTrack, b: &CoreTrack) -> bool {
        if self.key(a) != self.key(b) {
            return false;
        }
        if let (Some(left), Some(right)) = (a.duration, b.duration) {
            let delta = if left > right { left - right } else { right - left };
            if delta > self.duration_tolerance {
                return false;
            }
        }
        share_artist(&a.artist_names, &b.artist_names)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlbumMerge;

impl MergeKind for AlbumMerge {
    type Item = CoreAlbum;

    fn key(&self, item: &CoreAlbum) -> String {
        normalize_name(&item.name)
    }

    fn is_same(&self, a: &CoreAlbum, b: &CoreAlbum) -> bool {
        self.key(a) == self.key(b) && share_artist(&a.artist_names, &b.artist_names)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtistMerge;

impl MergeKind for ArtistMerge {
    type Item = CoreArtist;

    fn key(&self, item: &CoreArtist) -> String {
        normalize_name(&item.name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaylistMerge;

impl MergeKind for PlaylistMerge {
    type Item = CorePlaylist;

    fn key(&self, item: &CorePlaylist) -> String {
        normalize_name(&item.name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageMerge;

impl MergeKind for ImageMerge {
    type Item = CoreImage;

    fn key(&self, item: &CoreImage) -> String {
        item.uri.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, secs: Option<u64>) -> CoreTrack {
        let mut track = CoreTrack::new(SourceRef::new("local-files", "a"), "t", name);
        track.duration = secs.map(Duration::from_secs);
        track
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  The   Song\t"), "the song");
        assert_eq!(normalize_name("ÄRZTE"), "ärzte");
    }

    #[test]
    fn test_track_duration_tolerance() {
        let merge = TrackMerge::default();
        assert!(merge.is_same(&track("Song", Some(180)), &track("song", Some(181))));
        assert!(merge.is_same(&track("Song", Some(180)), &track("Song", Some(182))));
        assert!(!merge.is_same(&track("Song", Some(180)), &track("Song", Some(183))));
        assert!(merge.is_same(&track("Song", None), &track("Song", Some(400))));
    }

    #[test]
    fn test_track_artists_must_overlap_when_known() {
        let merge = TrackMerge::default();
        let a = track("Song", None).with_artist("x", "Band");
        let b = track("Song", None).with_artist("y", " band ");
        let c = track("Song", None).with_artist("z", "Other");
        assert!(merge.is_same(&a, &b));
        assert!(!merge.is_same(&a, &c));
        assert!(merge.is_same(&a, &track("Song", None)));
    }

    #[test]
    fn test_custom_tolerance() {
        let merge = TrackMerge::new(Duration::ZERO);
        assert!(!merge.is_same(&track("Song", Some(180)), &track("Song", Some(181))));
    }

    #[test]
    fn test_image_key_is_uri() {
        let source = SourceRef::new("local-files", "a");
        let a = CoreImage::new(source.clone(), "1", "file:///cover.jpg");
        let b = CoreImage::new(source, "2", "file:///cover.jpg ");
        assert!(ImageMerge.is_same(&a, &b));
    }
}
