//! # Local Files Core
//!
//! A [`Core`](core_contracts::Core) over the audio files of a folder.
//!
//! ## Overview
//!
//! - [`DirectorySource`] lists audio and playlist files below a folder
//! - [`LocalFilesCore`] scans them with the metadata scanner on `init`,
//!   stores the records in the metadata repositories and serves the library
//!   and search from there
//! - media sources are `file://` URIs of the scanned files
//!
//! ## Example
//!
//! ```ignore
//! use core_contracts::{CancellationToken, Core};
//! use provider_local::{DirectorySource, LocalFilesCore};
//! use std::sync::Arc;
//!
//! let core = LocalFilesCore::new(Arc::new(DirectorySource::new("/music")), config);
//! core.init(&CancellationToken::new()).await?;
//! let tracks = core.library().get_tracks(0, 50).await?;
//! ```

pub mod error;
pub mod library;
pub mod provider;
pub mod search;
pub mod source;

pub use error::{LocalFilesError, Result};
pub use library::LocalLibrary;
pub use provider::{file_uri, LocalFilesCore, LocalFilesCoreBuilder, ScanSummary, CORE_ID};
pub use search::LocalSearch;
pub use source::{DirectorySource, LocalFile};
