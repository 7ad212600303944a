//! Merge behaviour over whole collections: count bounds, ordering, paging
//! and change propagation.

use core_contracts::{CoreTrack, SourceRef};
use core_merge::{merge_sources, MergeError, Merged, MergedCollection, TrackMerge};
use std::collections::HashSet;
use std::time::Duration;

fn track(instance: &str, id: &str, name: &str, secs: u64) -> CoreTrack {
    CoreTrack::new(SourceRef::new("test", instance), id, name)
        .with_duration(Duration::from_secs(secs))
}

/// Deterministic pseudo-random source lists with overlapping titles.
fn generated_sources(seed: u64, source_count: usize) -> Vec<Vec<CoreTrack>> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };

    (0..source_count)
        .map(|s| {
            let len = next() % 12;
            (0..len)
                .map(|i| {
                    let title = format!("Title {}", next() % 8);
                    let secs = 180 + (next() % 6) as u64;
                    track(&format!("core-{s}"), &format!("{i}"), &title, secs)
                })
                .collect()
        })
        .collect()
}

#[test]
fn test_merged_count_is_bounded_by_sources() {
    for seed in 0..200u64 {
        for source_count in 1..=4 {
            let sources = generated_sources(seed, source_count);
            let sum: usize = sources.iter().map(Vec::len).sum();
            let max = sources.iter().map(Vec::len).max().unwrap_or(0);

            let merged = merge_sources(&TrackMerge::default(), sources);
            assert!(merged.len() <= sum, "seed {seed}: {} > {sum}", merged.len());
            assert!(merged.len() >= max, "seed {seed}: {} < {max}", merged.len());
        }
    }
}

#[test]
fn test_every_source_item_appears_exactly_once() {
    for seed in 0..100u64 {
        let sources = generated_sources(seed, 3);
        let expected: usize = sources.iter().map(Vec::len).sum();

        let merged = merge_sources(&TrackMerge::default(), sources);
        let keys: Vec<_> = merged.iter().flat_map(|m| m.source_keys()).collect();
        let unique: HashSet<_> = keys.iter().cloned().collect();
        assert_eq!(keys.len(), expected);
        assert_eq!(unique.len(), expected);

        for item in &merged {
            assert_eq!(item.source_cores().len(), item.sources().len());
            let instances: HashSet<_> = item
                .source_cores()
                .iter()
                .map(|s| s.instance_id.clone())
                .collect();
            assert_eq!(instances.len(), item.source_count());
        }
    }
}

#[test]
fn test_song_with_one_second_difference_merges() {
    let merged = merge_sources(
        &TrackMerge::default(),
        vec![
            vec![track("a", "1", "Song", 180)],
            vec![track("b", "1", "song", 181)],
        ],
    );
    assert_eq!(merged.len(), 1);
}

#[test]
fn test_two_core_library_scenario() {
    let mut library = MergedCollection::new(TrackMerge::default());
    library.replace_source("a", vec![track("a", "t1", "T1", 100), track("a", "t2", "T2", 200)]);
    library.replace_source("b", vec![track("b", "t2", "t2", 201), track("b", "t3", "T3", 300)]);

    let page = library.page(0, 10);
    let names: Vec<_> = page.iter().map(Merged::name).collect();
    assert_eq!(names, vec!["T1", "T2", "T3"]);
    assert_eq!(page[1].source_count(), 2);
    assert_eq!(page[1].source_keys()[1].to_string(), "b:t2");
}

#[test]
fn test_overlapping_pages_match_full_enumeration() {
    let sources = generated_sources(42, 4);
    let mut collection = MergedCollection::new(TrackMerge::default());
    for (index, items) in sources.into_iter().enumerate() {
        collection.replace_source(&format!("core-{index}"), items);
    }

    let full: Vec<_> = collection.page(0, usize::MAX).iter().map(Merged::key).collect();
    for size in 1..=7 {
        let mut stitched = Vec::new();
        let mut offset = 0;
        loop {
            let page = collection.page(offset, size);
            if page.is_empty() {
                break;
            }
            stitched.extend(page.iter().map(Merged::key));
            offset += size;
        }
        assert_eq!(stitched, full, "page size {size}");

        // A window starting mid-page agrees with the full list.
        let window: Vec<_> = collection.page(size, size * 2).iter().map(Merged::key).collect();
        let expected: Vec<_> = full.iter().skip(size).take(size * 2).cloned().collect();
        assert_eq!(window, expected);
    }
}

#[test]
fn test_fail_soft_resolves_from_next_source() {
    let merged = merge_sources(
        &TrackMerge::default(),
        vec![
            vec![track("a", "1", "Song", 180)],
            vec![track("b", "1", "Song", 180)],
            vec![track("c", "1", "Song", 180)],
        ],
    );
    let item = &merged[0];

    let resolved = item
        .try_resolve(|t| match t.source.instance_id.as_str() {
            "a" => Err("connection reset".to_string()),
            other => Ok(Some(format!("from {other}"))),
        })
        .unwrap();
    assert_eq!(resolved.as_deref(), Some("from b"));

    let all_failed: core_merge::Result<Option<String>> =
        item.try_resolve(|_| Err::<Option<String>, _>("offline"));
    assert!(matches!(
        all_failed,
        Err(MergeError::AggregateSourceFailure { attempted: 3, .. })
    ));
}

#[test]
fn test_removed_source_only_reports_orphans() {
    let mut library = MergedCollection::new(TrackMerge::default());
    library.replace_source("a", vec![track("a", "t1", "T1", 100), track("a", "t2", "T2", 200)]);
    library.replace_source("b", vec![track("b", "t2", "T2", 200), track("b", "t3", "T3", 300)]);

    let changes = library.remove_source("b");

    let removed: Vec<_> = changes.removed.iter().map(Merged::name).collect();
    assert_eq!(removed, vec!["T3"]);
    let updated: Vec<_> = changes.updated.iter().map(Merged::name).collect();
    assert_eq!(updated, vec!["T2"]);
    assert!(changes.added.is_empty());
}
