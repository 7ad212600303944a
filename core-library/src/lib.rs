//! # Metadata Library
//!
//! Storage for metadata records produced by the file scanner.
//!
//! - [`models`]: track, album, artist and playlist records plus the id scheme
//! - [`repositories`]: the [`MetadataRepository`](repositories::MetadataRepository)
//!   trait with in-memory and SQLite implementations
//! - [`db`]: SQLite pool creation and migrations

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{
    AlbumMetadata, ArtistMetadata, ImageMetadata, MetadataRecord, PlaylistMetadata, RecordKind,
    TrackMetadata,
};
pub use repositories::{InMemoryRepository, MetadataRepository, SqliteRepository};
