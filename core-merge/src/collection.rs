//! Merged collection with per-source snapshots.
//!
//! Every mutation recomputes the merged list from the source snapshots and
//! diffs it against the previous one. Merged items are matched across the
//! two lists by shared source keys, so an item that loses one of its
//! sources but keeps another shows up as updated, never as removed.

use core_contracts::{CoreItem, ItemKey};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::engine::merge_sources;
use crate::kinds::MergeKind;
use crate::merged::Merged;

/// Net effect of one mutation on the merged view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSet<T> {
    pub added: Vec<Merged<T>>,
    pub removed: Vec<Merged<T>>,
    pub updated: Vec<Merged<T>>,
}

impl<T> ChangeSet<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }
}

/// Incremental change reported by one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDelta<T> {
    pub added: Vec<T>,
    /// Ids of removed items, as known to the source
    pub removed: Vec<String>,
    /// Replacements for existing items, matched by id
    pub updated: Vec<T>,
}

impl<T> Default for SourceDelta<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }
}

struct SourceSlot<T> {
    instance_id: String,
    items: Vec<T>,
}

/// Deduplicated, paginated view over several sources of one item kind.
///
/// Sources keep the priority they were first added with unless
/// [`reorder_sources`](Self::reorder_sources) is called.
pub struct MergedCollection<K: MergeKind> {
    kind: K,
    sources: Vec<SourceSlot<K::Item>>,
    merged: Vec<Merged<K::Item>>,
}

impl<K: MergeKind> MergedCollection<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            sources: Vec::new(),
            merged: Vec::new(),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// `limit` merged items starting at `offset`; empty past the end.
    pub fn page(&self, offset: usize, limit: usize) -> Vec<Merged<K::Item>> {
        self.merged
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn items(&self) -> &[Merged<K::Item>] {
        &self.merged
    }

    pub fn get(&self, index: usize) -> Option<&Merged<K::Item>> {
        self.merged.get(index)
    }

    /// Merged item holding the source item with this key.
    pub fn find(&self, key: &ItemKey) -> Option<&Merged<K::Item>> {
        self.merged
            .iter()
            .find(|m| m.sources().iter().any(|s| &s.key() == key))
    }

    /// Instance ids in priority order.
    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.instance_id.as_str()).collect()
    }

    pub fn source_items(&self, instance_id: &str) -> Option<&[K::Item]> {
        self.sources
            .iter()
            .find(|s| s.instance_id == instance_id)
            .map(|s| s.items.as_slice())
    }

    /// Replace everything `instance_id` contributes. A new source is added
    /// with the lowest priority.
    pub fn replace_source(
        &mut self,
        instance_id: &str,
        items: Vec<K::Item>,
    ) -> ChangeSet<K::Item> {
        match self.sources.iter_mut().find(|s| s.instance_id == instance_id) {
            Some(slot) => slot.items = items,
            None => self.sources.push(SourceSlot {
                instance_id: instance_id.to_string(),
                items,
            }),
        }
        self.rebuild()
    }

    /// Replace every source at once, in priority order. Sources not listed
    /// are dropped.
    pub fn set_sources(&mut self, sources: Vec<(String, Vec<K::Item>)>) -> ChangeSet<K::Item> {
        self.sources = sources
            .into_iter()
            .map(|(instance_id, items)| SourceSlot { instance_id, items })
            .collect();
        self.rebuild()
    }

    pub fn remove_source(&mut self, instance_id: &str) -> ChangeSet<K::Item> {
        let before = self.sources.len();
        self.sources.retain(|s| s.instance_id != instance_id);
        if self.sources.len() == before {
            return ChangeSet::default();
        }
        self.rebuild()
    }

    /// Apply an incremental change from one source. Unknown sources are
    /// created with the delta's added items.
    pub fn apply_source_delta(
        &mut self,
        instance_id: &str,
        delta: SourceDelta<K::Item>,
    ) -> ChangeSet<K::Item> {
        let index = match self.sources.iter().position(|s| s.instance_id == instance_id) {
            Some(index) => index,
            None => {
                self.sources.push(SourceSlot {
                    instance_id: instance_id.to_string(),
                    items: Vec::new(),
                });
                self.sources.len() - 1
            }
        };

        let slot = &mut self.sources[index];
        if !delta.removed.is_empty() {
            let removed: HashSet<&str> = delta.removed.iter().map(String::as_str).collect();
            slot.items.retain(|item| !removed.contains(item.id()));
        }
        for replacement in delta.updated {
            if let Some(existing) = slot.items.iter_mut().find(|i| i.id() == replacement.id()) {
                *existing = replacement;
            }
        }
        slot.items.extend(delta.added);

        self.rebuild()
    }

    /// Change source priority. Ids not listed keep their relative order
    /// after the listed ones.
    pub fn reorder_sources(&mut self, order: &[String]) -> ChangeSet<K::Item> {
        let rank = |id: &str| order.iter().position(|o| o == id).unwrap_or(order.len());
        self.sources.sort_by_key(|s| rank(&s.instance_id));
        self.rebuild()
    }

    fn rebuild(&mut self) -> ChangeSet<K::Item> {
        let inputs = self.sources.iter().map(|s| s.items.clone()).collect();
        let next = merge_sources(&self.kind, inputs);
        let changes = diff(&self.merged, &next);
        self.merged = next;
        changes
    }
}

/// Match previous merged items to next ones through shared source keys.
fn diff<T: CoreItem + PartialEq>(previous: &[Merged<T>], next: &[Merged<T>]) -> ChangeSet<T> {
    let mut owner: HashMap<ItemKey, usize> = HashMap::new();
    for (index, merged) in next.iter().enumerate() {
        for key in merged.source_keys() {
            owner.entry(key).or_insert(index);
        }
    }

    let mut changes = ChangeSet::default();
    let mut matched = vec![false; next.len()];

    for old in previous {
        let successor = old
            .source_keys()
            .iter()
            .filter_map(|key| owner.get(key).copied())
            .find(|index| !matched[*index]);

        match successor {
            Some(index) => {
                matched[index] = true;
                if next[index] != *old {
                    changes.updated.push(next[index].clone());
                }
            }
            None => changes.removed.push(old.clone()),
        }
    }

    for (index, merged) in next.iter().enumerate() {
        if !matched[index] {
            changes.added.push(merged.clone());
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::TrackMerge;
    use core_contracts::{CoreTrack, SourceRef};
    use std::time::Duration;

    fn track(instance: &str, id: &str, name: &str) -> CoreTrack {
        CoreTrack::new(SourceRef::new("test", instance), id, name)
            .with_duration(Duration::from_secs(200))
    }

    fn names(items: &[Merged<CoreTrack>]) -> Vec<String> {
        items.iter().map(|m| m.name()).collect()
    }

    #[test]
    fn test_first_source_is_all_added() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        let changes = collection.replace_source("a", vec![track("a", "1", "One"), track("a", "2", "Two")]);

        assert_eq!(names(&changes.added), vec!["One", "Two"]);
        assert!(changes.removed.is_empty());
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_duplicate_from_second_source_is_update() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "One")]);

        let changes = collection.replace_source("b", vec![track("b", "9", "one"), track("b", "8", "Three")]);

        assert_eq!(names(&changes.added), vec!["Three"]);
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.updated[0].source_count(), 2);
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_remove_source_keeps_items_with_survivors() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "Shared"), track("a", "2", "Only A")]);
        collection.replace_source("b", vec![track("b", "1", "shared")]);

        let changes = collection.remove_source("a");

        assert_eq!(names(&changes.removed), vec!["Only A"]);
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.updated[0].key().to_string(), "b:1");
        assert!(changes.added.is_empty());
        assert_eq!(names(collection.items()), vec!["shared"]);
    }

    #[test]
    fn test_remove_unknown_source_is_noop() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "One")]);
        assert!(collection.remove_source("zzz").is_empty());
    }

    #[test]
    fn test_unchanged_replace_reports_nothing() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "One")]);
        let changes = collection.replace_source("a", vec![track("a", "1", "One")]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_apply_source_delta() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "One"), track("a", "2", "Two")]);

        let mut renamed = track("a", "2", "Two");
        renamed.track_number = Some(2);
        let changes = collection.apply_source_delta(
            "a",
            SourceDelta {
                added: vec![track("a", "3", "Three")],
                removed: vec!["1".to_string()],
                updated: vec![renamed],
            },
        );

        assert_eq!(names(&changes.added), vec!["Three"]);
        assert_eq!(names(&changes.removed), vec!["One"]);
        assert_eq!(names(&changes.updated), vec!["Two"]);
        assert_eq!(names(collection.items()), vec!["Two", "Three"]);
    }

    #[test]
    fn test_reorder_changes_primary() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "Song")]);
        collection.replace_source("b", vec![track("b", "1", "SONG")]);
        assert_eq!(collection.items()[0].name(), "Song");

        let changes = collection.reorder_sources(&["b".to_string(), "a".to_string()]);
        assert_eq!(collection.source_ids(), vec!["b", "a"]);
        assert_eq!(collection.items()[0].name(), "SONG");
        assert_eq!(changes.updated.len(), 1);
    }

    #[test]
    fn test_set_sources_single_change_set() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "One")]);

        let changes = collection.set_sources(vec![
            ("b".to_string(), vec![track("b", "1", "one"), track("b", "2", "Two")]),
        ]);

        assert_eq!(names(&changes.added), vec!["Two"]);
        assert_eq!(changes.updated.len(), 1);
        assert!(changes.removed.is_empty());
        assert_eq!(collection.source_ids(), vec!["b"]);
    }

    #[test]
    fn test_paging_past_end() {
        let mut collection = MergedCollection::new(TrackMerge::default());
        collection.replace_source("a", vec![track("a", "1", "One")]);
        assert!(collection.page(5, 10).is_empty());
        assert_eq!(collection.page(0, 0).len(), 0);
        assert!(collection.find(&ItemKey { instance_id: "a".into(), id: "1".into() }).is_some());
    }
}
