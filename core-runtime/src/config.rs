//! # Core Configuration
//!
//! Builder-based configuration for the aggregation core. `build()` validates
//! every setting and fails fast with an actionable [`Error`].
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .scan_parallelism(8)
//!     .duplicate_duration_tolerance(Duration::from_secs(3))
//!     .build()
//!     .unwrap();
//!
//! assert!(config.database_path.is_none());
//! ```
//!
//! Without a `database_path` every repository lives in memory. Persisted
//! metadata needs both the path and the `persist_metadata` feature:
//!
//! ```
//! use core_runtime::config::{CoreConfig, FeatureFlags};
//!
//! let err = CoreConfig::builder()
//!     .features(FeatureFlags { persist_metadata: true, ..Default::default() })
//!     .build();
//! assert!(err.is_err());
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SCAN_PARALLELISM: usize = 4;
pub const MAX_SCAN_PARALLELISM: usize = 64;
pub const DEFAULT_FETCH_BATCH_SIZE: usize = 100;
pub const MAX_FETCH_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_DUPLICATE_DURATION_TOLERANCE: Duration = Duration::from_secs(2);
pub const MAX_DUPLICATE_DURATION_TOLERANCE: Duration = Duration::from_secs(30);
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Separators a single artist tag value is split on.
///
/// `/` and `,` are deliberately absent: "AC/DC" and "Earth, Wind & Fire" are
/// single artists.
pub const DEFAULT_ARTIST_SEPARATORS: &[char] = &[';', '\0'];

/// Configuration for the aggregation core.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// SQLite database for persisted metadata. `None` keeps repositories in memory.
    pub database_path: Option<PathBuf>,

    /// Maximum number of files scanned concurrently.
    pub scan_parallelism: usize,

    /// Items requested per call when the aggregator pages through a core's collection.
    pub fetch_batch_size: usize,

    /// Two tracks with equal normalized titles are duplicates when their
    /// durations differ by at most this much.
    pub duplicate_duration_tolerance: Duration,

    /// Capacity of the event bus and of every per-core change channel.
    pub event_buffer_size: usize,

    pub artist_separators: Vec<char>,

    pub features: FeatureFlags,
}

/// Optional functionality toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Parse `.m3u`, `.m3u8` and `.pls` files found next to audio files.
    pub scan_playlists: bool,

    /// Write scan results to the SQLite database at `database_path`.
    pub persist_metadata: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            scan_parallelism: DEFAULT_SCAN_PARALLELISM,
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
            duplicate_duration_tolerance: DEFAULT_DUPLICATE_DURATION_TOLERANCE,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            artist_separators: DEFAULT_ARTIST_SEPARATORS.to_vec(),
            features: FeatureFlags {
                scan_playlists: true,
                persist_metadata: false,
            },
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - The database path is not empty when set
    /// - Scan parallelism, batch size and event buffer are in range
    /// - The duplicate tolerance does not exceed 30 seconds
    /// - At least one artist separator is configured, none of them whitespace
    /// - `persist_metadata` has a database to write to
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.scan_parallelism == 0 || self.scan_parallelism > MAX_SCAN_PARALLELISM {
            return Err(Error::Config(format!(
                "Scan parallelism must be between 1 and {}, got {}",
                MAX_SCAN_PARALLELISM, self.scan_parallelism
            )));
        }

        if self.fetch_batch_size == 0 || self.fetch_batch_size > MAX_FETCH_BATCH_SIZE {
            return Err(Error::Config(format!(
                "Fetch batch size must be between 1 and {}, got {}",
                MAX_FETCH_BATCH_SIZE, self.fetch_batch_size
            )));
        }

        if self.duplicate_duration_tolerance > MAX_DUPLICATE_DURATION_TOLERANCE {
            return Err(Error::Config(format!(
                "Duplicate duration tolerance exceeds maximum of {}s",
                MAX_DUPLICATE_DURATION_TOLERANCE.as_secs()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.artist_separators.is_empty() {
            return Err(Error::Config(
                "At least one artist separator is required".to_string(),
            ));
        }

        if self.artist_separators.iter().any(|c| c.is_whitespace()) {
            return Err(Error::Config(
                "Artist separators cannot be whitespace; names like \"Daft Punk\" would be split"
                    .to_string(),
            ));
        }

        if self.features.persist_metadata && self.database_path.is_none() {
            return Err(Error::CapabilityMissing {
                capability: "database_path".to_string(),
                message: "persist_metadata is enabled but no database path was configured. \
                          Set database_path or disable the feature to keep metadata in memory."
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for [`CoreConfig`].
///
/// Unset options fall back to the defaults documented on each setter.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    scan_parallelism: Option<usize>,
    fetch_batch_size: Option<usize>,
    duplicate_duration_tolerance: Option<Duration>,
    event_buffer_size: Option<usize>,
    artist_separators: Option<Vec<char>>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Default: 4
    pub fn scan_parallelism(mut self, parallelism: usize) -> Self {
        self.scan_parallelism = Some(parallelism);
        self
    }

    /// Default: 100
    pub fn fetch_batch_size(mut self, size: usize) -> Self {
        self.fetch_batch_size = Some(size);
        self
    }

    /// Default: 2 seconds
    pub fn duplicate_duration_tolerance(mut self, tolerance: Duration) -> Self {
        self.duplicate_duration_tolerance = Some(tolerance);
        self
    }

    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Default: `;` and NUL
    pub fn artist_separators(mut self, separators: impl IntoIterator<Item = char>) -> Self {
        self.artist_separators = Some(separators.into_iter().collect());
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    pub fn scan_playlists(mut self, enable: bool) -> Self {
        let mut features = self.features.unwrap_or(CoreConfig::default().features);
        features.scan_playlists = enable;
        self.features = Some(features);
        self
    }

    pub fn persist_metadata(mut self, enable: bool) -> Self {
        let mut features = self.features.unwrap_or(CoreConfig::default().features);
        features.persist_metadata = enable;
        self.features = Some(features);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();
        let config = CoreConfig {
            database_path: self.database_path,
            scan_parallelism: self.scan_parallelism.unwrap_or(defaults.scan_parallelism),
            fetch_batch_size: self.fetch_batch_size.unwrap_or(defaults.fetch_batch_size),
            duplicate_duration_tolerance: self
                .duplicate_duration_tolerance
                .unwrap_or(defaults.duplicate_duration_tolerance),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
            artist_separators: self
                .artist_separators
                .unwrap_or(defaults.artist_separators),
            features: self.features.unwrap_or(defaults.features),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_defaults() {
        let config = CoreConfig::builder().build().unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.scan_parallelism, 4);
        assert_eq!(config.fetch_batch_size, 100);
        assert_eq!(config.duplicate_duration_tolerance, Duration::from_secs(2));
        assert_eq!(config.artist_separators, vec![';', '\0']);
        assert!(config.features.scan_playlists);
        assert!(!config.features.persist_metadata);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CoreConfig::builder()
            .database_path("/tmp/music.db")
            .scan_parallelism(16)
            .fetch_batch_size(25)
            .event_buffer_size(8)
            .artist_separators([';', '|'])
            .persist_metadata(true)
            .scan_playlists(false)
            .build()
            .unwrap();

        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/music.db")));
        assert_eq!(config.scan_parallelism, 16);
        assert_eq!(config.fetch_batch_size, 25);
        assert_eq!(config.event_buffer_size, 8);
        assert_eq!(config.artist_separators, vec![';', '|']);
        assert!(config.features.persist_metadata);
        assert!(!config.features.scan_playlists);
    }

    #[test]
    fn test_rejects_zero_parallelism() {
        let result = CoreConfig::builder().scan_parallelism(0).build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Scan parallelism")));
    }

    #[test]
    fn test_rejects_excessive_parallelism() {
        let result = CoreConfig::builder().scan_parallelism(65).build();
        assert!(result.is_err());
        assert!(CoreConfig::builder().scan_parallelism(64).build().is_ok());
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        assert!(CoreConfig::builder().fetch_batch_size(0).build().is_err());
    }

    #[test]
    fn test_rejects_excessive_tolerance() {
        let result = CoreConfig::builder()
            .duplicate_duration_tolerance(Duration::from_secs(31))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_database_path() {
        assert!(CoreConfig::builder().database_path("").build().is_err());
    }

    #[test]
    fn test_rejects_whitespace_separator() {
        let result = CoreConfig::builder().artist_separators([' ']).build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("whitespace")));
        assert!(CoreConfig::builder()
            .artist_separators(std::iter::empty())
            .build()
            .is_err());
    }

    #[test]
    fn test_persist_metadata_requires_database() {
        let result = CoreConfig::builder().persist_metadata(true).build();
        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "database_path")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
