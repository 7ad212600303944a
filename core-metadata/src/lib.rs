//! # Metadata Scanner
//!
//! Turns audio and playlist files into metadata records.
//!
//! ## Overview
//!
//! - [`tags`]: tag reading (ID3, Vorbis, MP4, APE, RIFF) through `lofty`
//! - [`artists`]: splitting of multi-artist credits into separate names
//! - [`scanner`]: bounded concurrent scanning of [`FileHandle`](bridge_traits::FileHandle)s
//! - [`playlist`]: M3U/M3U8/PLS parsing
//! - [`indexer`]: writing scan results into the metadata repositories
//!
//! ## Example
//!
//! ```ignore
//! use core_metadata::{FileScanner, MetadataIndexer, MetadataStores};
//! use tokio_util::sync::CancellationToken;
//!
//! let scanner = FileScanner::from_config(&config);
//! let report = scanner.scan(files, config.scan_parallelism, &CancellationToken::new()).await;
//!
//! let indexer = MetadataIndexer::new(MetadataStores::in_memory());
//! indexer.index(&report.files).await?;
//! ```

pub mod artists;
pub mod error;
pub mod indexer;
pub mod playlist;
pub mod scanner;
pub mod tags;

pub use artists::split_artists;
pub use error::{MetadataError, Result, ScanError};
pub use indexer::{IndexSummary, MetadataIndexer, MetadataStores};
pub use playlist::parse_playlist;
pub use scanner::{FileMetadata, FileScanner, ScanReport};
pub use tags::{LoftyTagReader, RawTags, TagReader};
