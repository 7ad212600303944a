//! # Merge Engine
//!
//! Combines items of one kind reported by several cores into a single
//! deduplicated, order-preserving list.
//!
//! - [`kinds`]: per-kind identity rules ([`TrackMerge`], [`AlbumMerge`], ...)
//! - [`merge_sources`]: the merge function itself
//! - [`Merged`]: one logical item with its per-core sources and resolved
//!   properties
//! - [`MergedCollection`]: per-source snapshots plus the merged view, with
//!   net [`ChangeSet`]s on every mutation
//!
//! Everything here is synchronous and performs no I/O. Source priority is
//! the order sources are passed in and never depends on timing.
//!
//! ```
//! use core_contracts::{CoreTrack, SourceRef};
//! use core_merge::{merge_sources, TrackMerge};
//! use std::time::Duration;
//!
//! let a = CoreTrack::new(SourceRef::new("local-files", "a"), "1", "Song")
//!     .with_duration(Duration::from_secs(180));
//! let b = CoreTrack::new(SourceRef::new("onedrive", "b"), "x", "song")
//!     .with_duration(Duration::from_secs(181));
//!
//! let merged = merge_sources(&TrackMerge::default(), vec![vec![a], vec![b]]);
//! assert_eq!(merged.len(), 1);
//! assert_eq!(merged[0].source_count(), 2);
//! ```

pub mod collection;
pub mod engine;
pub mod error;
pub mod kinds;
pub mod merged;

pub use collection::{ChangeSet, MergedCollection, SourceDelta};
pub use engine::merge_sources;
pub use error::{MergeError, Result};
pub use kinds::{
    normalize_name, AlbumMerge, ArtistMerge, ImageMerge, MergeKind, PlaylistMerge, TrackMerge,
};
pub use merged::Merged;
