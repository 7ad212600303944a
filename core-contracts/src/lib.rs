//! # Core Contracts
//!
//! The capability interface every music source implements and the aggregation
//! root consumes.
//!
//! A [`Core`] is an independently initialized source such as local files, a
//! cloud drive or a streaming service. It exposes:
//! - a mandatory [`library`](Core::library) [`CollectionGroup`]
//! - optional recently played, discoverables and pins groups
//! - an optional [`SearchCapability`]
//! - devices, media source resolution and a [`CoreChange`] stream
//!
//! Items ([`CoreTrack`], [`CoreAlbum`], ...) hold a [`SourceRef`] back to the
//! core instance that produced them. Their ids are only unique within that
//! instance.

pub mod core;
pub mod error;
pub mod models;

pub use crate::core::{
    CollectionGroup, Core, CoreChange, CoreLifecycle, CoreState, SearchCapability,
};
pub use error::{CoreError, Result};
pub use models::{
    CoreAlbum, CoreArtist, CoreImage, CoreItem, CorePlaylist, CoreTrack, Device, ItemKey,
    MediaSource, SearchResults, SourceRef,
};

pub use core_runtime::events::{GroupKind, ItemKind};
pub use tokio_util::sync::CancellationToken;
