//! The merge function.

use std::collections::HashMap;

use crate::kinds::MergeKind;
use crate::merged::Merged;

/// Merge per-source item lists into one deduplicated list.
///
/// `sources` is in priority order. Items are visited source by source, each
/// in its own order; an item joins the first earlier merged item it
/// [`is_same`](MergeKind::is_same) as, unless that merged item already holds
/// an item from the same core instance. Otherwise it starts a new merged item
/// at the end. The first occurrence therefore fixes the position, and the
/// output never depends on anything but the inputs and their order.
///
/// The result has at most the sum and at least the largest of the source
/// lengths.
pub fn merge_sources<K: MergeKind>(kind: &K, sources: Vec<Vec<K::Item>>) -> Vec<Merged<K::Item>> {
    let capacity = sources.iter().map(Vec::len).max().unwrap_or(0);
    let mut merged: Vec<Merged<K::Item>> = Vec::with_capacity(capacity);
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();

    for items in sources {
        for item in items {
            let key = kind.key(&item);
            let candidates = buckets.entry(key).or_default();

            let instance_id = &kind.source(&item).instance_id;
            let target = candidates.iter().copied().find(|&index| {
                let existing = &merged[index];
                !existing.has_source(instance_id) && kind.is_same(existing.primary(), &item)
            });

            match target {
                Some(index) => merged[index].push(item),
                None => {
                    candidates.push(merged.len());
                    merged.push(Merged::new(item));
                }
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{ArtistMerge, TrackMerge};
    use core_contracts::{CoreArtist, CoreTrack, SourceRef};
    use std::time::Duration;

    fn track(instance: &str, id: &str, name: &str, secs: u64) -> CoreTrack {
        CoreTrack::new(SourceRef::new("test", instance), id, name)
            .with_duration(Duration::from_secs(secs))
    }

    #[test]
    fn test_case_different_titles_within_tolerance_merge() {
        let merged = merge_sources(
            &TrackMerge::default(),
            vec![
                vec![track("a", "1", "Song", 180)],
                vec![track("b", "1", "SONG", 181)],
            ],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_count(), 2);
        assert_eq!(merged[0].name(), "Song");
    }

    #[test]
    fn test_same_instance_never_merges() {
        let merged = merge_sources(
            &TrackMerge::default(),
            vec![vec![
                track("a", "1", "Song", 180),
                track("a", "2", "Song", 180),
            ]],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_duplicate_in_source_pairs_with_next_free_group() {
        let merged = merge_sources(
            &TrackMerge::default(),
            vec![
                vec![track("a", "1", "Song", 180), track("a", "2", "Song", 180)],
                vec![track("b", "1", "Song", 180), track("b", "2", "Song", 180)],
            ],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source_keys()[1].to_string(), "b:1");
        assert_eq!(merged[1].source_keys()[1].to_string(), "b:2");
    }

    #[test]
    fn test_first_occurrence_keeps_position() {
        let merged = merge_sources(
            &ArtistMerge,
            vec![
                vec![
                    CoreArtist::new(SourceRef::new("test", "a"), "1", "Alpha"),
                    CoreArtist::new(SourceRef::new("test", "a"), "2", "Beta"),
                ],
                vec![
                    CoreArtist::new(SourceRef::new("test", "b"), "1", "Gamma"),
                    CoreArtist::new(SourceRef::new("test", "b"), "2", "alpha"),
                ],
            ],
        );
        let names: Vec<_> = merged.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(merged[0].source_count(), 2);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_sources(&TrackMerge::default(), vec![]).is_empty());
        assert!(merge_sources(&TrackMerge::default(), vec![vec![], vec![]]).is_empty());
    }
}
