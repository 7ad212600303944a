//! A logical item seen through one or more cores.

use core_contracts::{
    CoreAlbum, CoreArtist, CoreImage, CoreItem, CorePlaylist, CoreTrack, ItemKey, SourceRef,
};
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

use crate::error::{MergeError, Result};
use crate::kinds::normalize_name;

/// One or more per-core items representing the same logical item.
///
/// Sources are held in priority order and never empty. `source_cores()[i]` is
/// the core that produced `sources()[i]`.
///
/// Scalar properties resolve to the first non-empty value in source order.
/// Collection properties concatenate all sources and drop duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Merged<T> {
    sources: Vec<T>,
}

impl<T: CoreItem> Merged<T> {
    pub fn new(primary: T) -> Self {
        Self {
            sources: vec![primary],
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        self.sources.push(item);
    }

    pub fn sources(&self) -> &[T] {
        &self.sources
    }

    pub fn source_cores(&self) -> Vec<&SourceRef> {
        self.sources.iter().map(|s| s.source()).collect()
    }

    /// Highest-priority source.
    pub fn primary(&self) -> &T {
        &self.sources[0]
    }

    /// Identity of the merged item: the key of its primary source.
    pub fn key(&self) -> ItemKey {
        self.primary().key()
    }

    pub fn source_keys(&self) -> Vec<ItemKey> {
        self.sources.iter().map(|s| s.key()).collect()
    }

    pub fn has_source(&self, instance_id: &str) -> bool {
        self.sources
            .iter()
            .any(|s| s.source().instance_id == instance_id)
    }

    /// The item this instance contributed, if any.
    pub fn source_for(&self, instance_id: &str) -> Option<&T> {
        self.sources
            .iter()
            .find(|s| s.source().instance_id == instance_id)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// First `Ok(Some(_))` in source order.
    ///
    /// A source whose accessor fails is logged and treated as having no
    /// value. Fails with [`MergeError::AggregateSourceFailure`] only when
    /// every source failed.
    pub fn try_resolve<V, E, F>(&self, accessor: F) -> Result<Option<V>>
    where
        E: Display,
        F: Fn(&T) -> std::result::Result<Option<V>, E>,
    {
        let mut errors = Vec::new();
        for source in &self.sources {
            match accessor(source) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        item = %source.key(),
                        kind = T::KIND.as_str(),
                        error = %e,
                        "Source failed during property lookup"
                    );
                    errors.push(format!("{}: {}", source.key(), e));
                }
            }
        }

        if errors.len() == self.sources.len() {
            return Err(MergeError::AggregateSourceFailure {
                attempted: self.sources.len(),
                errors,
            });
        }
        Ok(None)
    }

    /// Concatenation of every source's values with duplicates removed.
    ///
    /// Failing sources are skipped as in [`try_resolve`](Self::try_resolve).
    pub fn try_resolve_all<V, E, F>(&self, accessor: F) -> Result<Vec<V>>
    where
        V: PartialEq,
        E: Display,
        F: Fn(&T) -> std::result::Result<Vec<V>, E>,
    {
        let mut values = Vec::new();
        let mut errors = Vec::new();
        for source in &self.sources {
            match accessor(source) {
                Ok(items) => {
                    for item in items {
                        if !values.contains(&item) {
                            values.push(item);
                        }
                    }
                }
                Err(e) => {
                    warn!(item = %source.key(), error = %e, "Source failed during collection lookup");
                    errors.push(format!("{}: {}", source.key(), e));
                }
            }
        }

        if errors.len() == self.sources.len() {
            return Err(MergeError::AggregateSourceFailure {
                attempted: self.sources.len(),
                errors,
            });
        }
        Ok(values)
    }

    pub fn resolve<V>(&self, accessor: impl Fn(&T) -> Option<V>) -> Option<V> {
        self.sources.iter().find_map(accessor)
    }

    pub fn resolve_all<V: PartialEq>(&self, accessor: impl Fn(&T) -> Vec<V>) -> Vec<V> {
        let mut values = Vec::new();
        for value in self.sources.iter().flat_map(accessor) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        values
    }

    /// Like [`resolve_all`](Self::resolve_all) for names: duplicates are
    /// detected after normalization and the first spelling is kept.
    pub fn resolve_names(&self, accessor: impl Fn(&T) -> Vec<String>) -> Vec<String> {
        let mut seen = Vec::new();
        let mut values = Vec::new();
        for value in self.sources.iter().flat_map(accessor) {
            let normalized = normalize_name(&value);
            if normalized.is_empty() || seen.contains(&normalized) {
                continue;
            }
            seen.push(normalized);
            values.push(value);
        }
        values
    }

    pub fn name(&self) -> String {
        self.resolve(|s| non_empty(s.name())).unwrap_or_default()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| value.to_string())
}

fn non_empty_opt(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(non_empty)
}

fn non_zero(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}

fn unique_images(images: Vec<CoreImage>) -> Vec<CoreImage> {
    let mut result: Vec<CoreImage> = Vec::new();
    for image in images {
        if !result.iter().any(|i| i.uri.trim() == image.uri.trim()) {
            result.push(image);
        }
    }
    result
}

impl Merged<CoreTrack> {
    pub fn description(&self) -> Option<String> {
        self.resolve(|s| non_empty_opt(&s.description))
    }

    pub fn duration(&self) -> Option<Duration> {
        self.resolve(|s| s.duration.filter(|d| !d.is_zero()))
    }

    pub fn track_number(&self) -> Option<u32> {
        self.resolve(|s| s.track_number)
    }

    pub fn disc_number(&self) -> Option<u32> {
        self.resolve(|s| s.disc_number)
    }

    pub fn album_name(&self) -> Option<String> {
        self.resolve(|s| non_empty_opt(&s.album_name))
    }

    pub fn year(&self) -> Option<u32> {
        self.resolve(|s| s.year)
    }

    pub fn artist_names(&self) -> Vec<String> {
        self.resolve_names(|s| s.artist_names.clone())
    }

    /// Artist references of every source, scoped to the source instance.
    pub fn artist_ids(&self) -> Vec<ItemKey> {
        self.resolve_all(|s| {
            s.artist_ids
                .iter()
                .map(|id| ItemKey {
                    instance_id: s.source.instance_id.clone(),
                    id: id.clone(),
                })
                .collect()
        })
    }

    pub fn genres(&self) -> Vec<String> {
        self.resolve_names(|s| s.genres.clone())
    }

    pub fn images(&self) -> Vec<CoreImage> {
        unique_images(self.sources.iter().flat_map(|s| s.images.clone()).collect())
    }
}

impl Merged<CoreAlbum> {
    pub fn description(&self) -> Option<String> {
        self.resolve(|s| non_empty_opt(&s.description))
    }

    pub fn year(&self) -> Option<u32> {
        self.resolve(|s| s.year)
    }

    pub fn artist_names(&self) -> Vec<String> {
        self.resolve_names(|s| s.artist_names.clone())
    }

    pub fn genres(&self) -> Vec<String> {
        self.resolve_names(|s| s.genres.clone())
    }

    pub fn images(&self) -> Vec<CoreImage> {
        unique_images(self.sources.iter().flat_map(|s| s.images.clone()).collect())
    }

    /// Largest track count reported by any source.
    pub fn total_tracks(&self) -> usize {
        self.sources.iter().map(|s| s.total_tracks).max().unwrap_or(0)
    }
}

impl Merged<CoreArtist> {
    pub fn description(&self) -> Option<String> {
        self.resolve(|s| non_empty_opt(&s.description))
    }

    pub fn genres(&self) -> Vec<String> {
        self.resolve_names(|s| s.genres.clone())
    }

    pub fn images(&self) -> Vec<CoreImage> {
        unique_images(self.sources.iter().flat_map(|s| s.images.clone()).collect())
    }

    pub fn total_tracks(&self) -> usize {
        self.resolve(|s| non_zero(s.total_tracks)).unwrap_or(0)
    }

    pub fn total_albums(&self) -> usize {
        self.resolve(|s| non_zero(s.total_albums)).unwrap_or(0)
    }
}

impl Merged<CorePlaylist> {
    pub fn description(&self) -> Option<String> {
        self.resolve(|s| non_empty_opt(&s.description))
    }

    pub fn images(&self) -> Vec<CoreImage> {
        unique_images(self.sources.iter().flat_map(|s| s.images.clone()).collect())
    }

    pub fn total_tracks(&self) -> usize {
        self.resolve(|s| non_zero(s.total_tracks)).unwrap_or(0)
    }
}

impl Merged<CoreImage> {
    pub fn uri(&self) -> &str {
        &self.primary().uri
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.resolve(|s| s.width.zip(s.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(instance: &str) -> SourceRef {
        SourceRef::new("test", instance)
    }

    fn merged_tracks(tracks: Vec<CoreTrack>) -> Merged<CoreTrack> {
        let mut iter = tracks.into_iter();
        let mut merged = Merged::new(iter.next().unwrap());
        for track in iter {
            merged.push(track);
        }
        merged
    }

    #[test]
    fn test_scalar_first_non_empty_wins() {
        let mut a = CoreTrack::new(source("a"), "1", "  ");
        a.description = Some(String::new());
        let mut b = CoreTrack::new(source("b"), "2", "Song");
        b.description = Some("From B".to_string());
        b.track_number = Some(4);
        let mut c = CoreTrack::new(source("c"), "3", "Song (C)");
        c.track_number = Some(9);

        let merged = merged_tracks(vec![a, b, c]);
        assert_eq!(merged.name(), "Song");
        assert_eq!(merged.description().as_deref(), Some("From B"));
        assert_eq!(merged.track_number(), Some(4));
        assert_eq!(merged.duration(), None);
    }

    #[test]
    fn test_source_cores_align_with_sources() {
        let merged = merged_tracks(vec![
            CoreTrack::new(source("a"), "1", "Song"),
            CoreTrack::new(source("b"), "2", "Song"),
        ]);
        let cores = merged.source_cores();
        assert_eq!(cores.len(), merged.sources().len());
        for (core, item) in cores.iter().zip(merged.sources()) {
            assert_eq!(*core, &item.source);
        }
        assert_eq!(merged.key().to_string(), "a:1");
        assert!(merged.has_source("b"));
        assert_eq!(merged.source_for("b").map(|t| t.id.as_str()), Some("2"));
    }

    #[test]
    fn test_collections_concatenate_and_dedup() {
        let mut a = CoreTrack::new(source("a"), "1", "Song")
            .with_artist("x", "Band")
            .with_artist("y", "Guest");
        let mut b = CoreTrack::new(source("b"), "2", "Song").with_artist("z", "band");
        let mut a_image = CoreImage::new(source("a"), "i1", "file:///cover.jpg");
        a_image.width = Some(500);
        b.images = vec![
            CoreImage::new(source("b"), "i2", "file:///cover.jpg"),
            CoreImage::new(source("b"), "i3", "https://img/large.jpg"),
        ];
        a.images = vec![a_image];

        let merged = merged_tracks(vec![a, b]);
        assert_eq!(merged.artist_names(), vec!["Band", "Guest"]);
        assert_eq!(merged.artist_ids().len(), 3);
        let images = merged.images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].width, Some(500));
    }

    #[test]
    fn test_try_resolve_fails_soft() {
        let merged = merged_tracks(vec![
            CoreTrack::new(source("a"), "1", "Song"),
            CoreTrack::new(source("b"), "2", "Song"),
            CoreTrack::new(source("c"), "3", "Song"),
        ]);

        let value = merged
            .try_resolve(|t| {
                if t.source.instance_id == "a" {
                    Err("unreachable")
                } else {
                    Ok(Some(t.source.instance_id.clone()))
                }
            })
            .unwrap();
        assert_eq!(value.as_deref(), Some("b"));
    }

    #[test]
    fn test_try_resolve_all_sources_fail() {
        let merged = merged_tracks(vec![
            CoreTrack::new(source("a"), "1", "Song"),
            CoreTrack::new(source("b"), "2", "Song"),
        ]);

        let result: Result<Option<String>> = merged.try_resolve(|_| Err("offline"));
        match result {
            Err(MergeError::AggregateSourceFailure { attempted, errors }) => {
                assert_eq!(attempted, 2);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_try_resolve_none_without_failures() {
        let merged = merged_tracks(vec![CoreTrack::new(source("a"), "1", "Song")]);
        let result: Result<Option<u32>> = merged.try_resolve(|_| Ok::<_, String>(None));
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn test_album_totals() {
        let mut a = CoreAlbum::new(source("a"), "1", "Album");
        a.total_tracks = 10;
        let mut b = CoreAlbum::new(source("b"), "2", "Album");
        b.total_tracks = 12;
        let mut merged = Merged::new(a);
        merged.push(b);
        assert_eq!(merged.total_tracks(), 12);
    }
}
