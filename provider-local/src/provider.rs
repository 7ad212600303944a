//! The local files core.

use async_trait::async_trait;
use bridge_traits::storage::{FileHandle, FileSource};
use core_contracts::{
    CancellationToken, CollectionGroup, Core, CoreChange, CoreError, CoreItem, CoreLifecycle,
    CoreState, CoreTrack, GroupKind, ItemKind, MediaSource, Result as CoreResult, SearchCapability,
    SourceRef,
};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::models::{playlist_id_for_path, track_id_for_path};
use core_library::MetadataRepository;
use core_metadata::playlist::is_playlist_extension;
use core_metadata::{parse_playlist, FileScanner, MetadataIndexer, MetadataStores};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::{LocalFilesError, Result};
use crate::library::{LocalLibrary, RecordMapper};
use crate::search::LocalSearch;

/// Source type id shared by every local files core.
pub const CORE_ID: &str = "local-files";

/// Outcome of one scan of the file source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub tracks: usize,
    pub albums: usize,
    pub artists: usize,
    pub playlists: usize,
    /// Files that could not be read or parsed.
    pub failed: usize,
    /// Tracks and playlists removed because their files disappeared.
    pub removed: usize,
}

/// Builder for [`LocalFilesCore`].
pub struct LocalFilesCoreBuilder {
    source: Arc<dyn FileSource>,
    config: CoreConfig,
    instance_id: Option<String>,
    stores: Option<MetadataStores>,
    scanner: Option<FileScanner>,
    events: Option<EventBus>,
}

impl LocalFilesCoreBuilder {
    /// Defaults to a random UUID.
    pub fn instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Defaults to in-memory repositories.
    pub fn stores(mut self, stores: MetadataStores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Defaults to the lofty scanner configured from the [`CoreConfig`].
    pub fn scanner(mut self, scanner: FileScanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Publish scan progress on `bus`.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn build(self) -> LocalFilesCore {
        let instance_id = self
            .instance_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let stores = self.stores.unwrap_or_else(MetadataStores::in_memory);
        let mut scanner = self
            .scanner
            .unwrap_or_else(|| FileScanner::from_config(&self.config));
        if let Some(bus) = self.events {
            scanner = scanner.with_event_bus(bus);
        }

        let mapper = RecordMapper::new(stores.clone(), SourceRef::new(CORE_ID, &instance_id));
        let display_name = self.source.label();

        LocalFilesCore {
            lifecycle: CoreLifecycle::new(self.config.event_buffer_size),
            display_name: RwLock::new(display_name),
            library: Arc::new(LocalLibrary::new(mapper.clone())),
            search: Arc::new(LocalSearch::new(mapper)),
            indexer: MetadataIndexer::new(stores),
            scan_lock: Mutex::new(()),
            instance_id,
            source: self.source,
            config: self.config,
            scanner,
        }
    }
}

/// A core serving the audio files of a [`FileSource`].
///
/// `init` lists and scans the source, then serves the library and search
/// from the metadata repositories. [`rescan`](Self::rescan) picks up added,
/// changed and deleted files.
pub struct LocalFilesCore {
    instance_id: String,
    display_name: RwLock<String>,
    source: Arc<dyn FileSource>,
    config: CoreConfig,
    scanner: FileScanner,
    indexer: MetadataIndexer,
    library: Arc<LocalLibrary>,
    search: Arc<LocalSearch>,
    lifecycle: CoreLifecycle,
    scan_lock: Mutex<()>,
}

impl LocalFilesCore {
    /// In-memory core with default settings.
    pub fn new(source: Arc<dyn FileSource>, config: CoreConfig) -> Self {
        Self::builder(source, config).build()
    }

    pub fn builder(source: Arc<dyn FileSource>, config: CoreConfig) -> LocalFilesCoreBuilder {
        LocalFilesCoreBuilder {
            source,
            config,
            instance_id: None,
            stores: None,
            scanner: None,
            events: None,
        }
    }

    /// Core whose metadata is persisted to the SQLite database at
    /// `config.database_path` when the `persist_metadata` feature is on.
    pub async fn open(source: Arc<dyn FileSource>, config: CoreConfig) -> Result<Self> {
        let stores = match (&config.database_path, config.features.persist_metadata) {
            (Some(path), true) => {
                let pool = create_pool(DatabaseConfig::new(path)).await?;
                MetadataStores::sqlite(pool)
            }
            _ => MetadataStores::in_memory(),
        };
        Ok(Self::builder(source, config).stores(stores).build())
    }

    pub fn stores(&self) -> &MetadataStores {
        self.indexer.stores()
    }

    pub fn set_display_name(&self, name: impl Into<String>) {
        let name = name.into();
        match self.display_name.write() {
            Ok(mut current) if *current != name => *current = name.clone(),
            _ => return,
        }
        self.lifecycle.publish(CoreChange::DisplayNameChanged(name));
    }

    /// Scan the source again and publish the collections that changed.
    ///
    /// Only valid once the core is loaded.
    #[instrument(skip(self, cancel), fields(instance_id = %self.instance_id))]
    pub async fn rescan(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        if self.lifecycle.state() != CoreState::Loaded {
            return Err(LocalFilesError::NotLoaded);
        }
        let summary = self.scan(cancel).await?;
        for kind in [
            ItemKind::Track,
            ItemKind::Album,
            ItemKind::Artist,
            ItemKind::Playlist,
        ] {
            self.lifecycle.publish(CoreChange::CollectionChanged {
                group: GroupKind::Library,
                kind,
            });
        }
        Ok(summary)
    }

    async fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        let _guard = self.scan_lock.lock().await;
        if cancel.is_cancelled() {
            return Err(LocalFilesError::Cancelled);
        }

        let files = self.source.list_files().await?;
        let (playlists, audio): (Vec<_>, Vec<_>) = files.into_iter().partition(|file| {
            file.extension()
                .map(|ext| is_playlist_extension(&ext))
                .unwrap_or(false)
        });

        let report = self
            .scanner
            .scan(audio, self.config.scan_parallelism, cancel)
            .await;
        if report.cancelled {
            return Err(LocalFilesError::Cancelled);
        }

        let indexed = self.indexer.index(&report.files).await?;
        let mut summary = ScanSummary {
            tracks: indexed.tracks,
            albums: indexed.albums,
            artists: indexed.artists,
            failed: report.errors.len(),
            ..ScanSummary::default()
        };

        // Files that failed to read keep their previous records.
        let present: HashSet<String> = report
            .files
            .iter()
            .map(|f| f.track.id.clone())
            .chain(report.errors.iter().map(|e| track_id_for_path(&e.file)))
            .collect();
        let stale: Vec<String> = self
            .stores()
            .tracks
            .all()
            .await?
            .into_iter()
            .map(|t| t.id)
            .filter(|id| !present.contains(id))
            .collect();
        summary.removed += self.indexer.remove_tracks(&stale).await?;

        if self.config.features.scan_playlists {
            let (count, failed) = self.scan_playlists(&playlists, cancel).await?;
            summary.playlists = count;
            summary.failed += failed;
        }
        let listed: HashSet<String> = if self.config.features.scan_playlists {
            playlists.iter().map(|f| playlist_id_for_path(f.id())).collect()
        } else {
            HashSet::new()
        };
        for playlist in self.stores().playlists.all().await? {
            if !listed.contains(&playlist.id) && self.stores().playlists.remove(&playlist.id).await? {
                summary.removed += 1;
            }
        }

        info!(
            tracks = summary.tracks,
            playlists = summary.playlists,
            failed = summary.failed,
            removed = summary.removed,
            "Local library scanned"
        );
        Ok(summary)
    }

    /// Parses playlist files; unreadable ones are skipped.
    async fn scan_playlists(
        &self,
        files: &[Arc<dyn FileHandle>],
        cancel: &CancellationToken,
    ) -> Result<(usize, usize)> {
        let mut parsed = Vec::with_capacity(files.len());
        let mut failed = 0;
        for file in files {
            if cancel.is_cancelled() {
                return Err(LocalFilesError::Cancelled);
            }
            let data = match file.read_all().await {
                Ok(data) => data,
                Err(e) => {
                    warn!(file = %file.name(), error = %e, "Skipping unreadable playlist");
                    failed += 1;
                    continue;
                }
            };
            match parse_playlist(file.id(), &String::from_utf8_lossy(&data)) {
                Ok(playlist) => parsed.push(playlist),
                Err(e) => {
                    warn!(file = %file.name(), error = %e, "Skipping invalid playlist");
                    failed += 1;
                }
            }
        }
        let count = self.indexer.index_playlists(parsed).await?;
        Ok((count, failed))
    }
}

/// `file://` URI of a local path. Windows paths get the `file:///` form.
pub fn file_uri(path: &str) -> String {
    let path = path.replace('\\', "/");
    let encoded: Vec<String> = path
        .split('/')
        .enumerate()
        .map(|(i, segment)| {
            let is_drive = i == 0 && segment.len() == 2 && segment.ends_with(':');
            if is_drive {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect();
    let encoded = encoded.join("/");
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

#[async_trait]
impl Core for LocalFilesCore {
    fn id(&self) -> &str {
        CORE_ID
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn display_name(&self) -> String {
        self.display_name
            .read()
            .map(|name| name.clone())
            .unwrap_or_default()
    }

    fn state(&self) -> CoreState {
        self.lifecycle.state()
    }

    #[instrument(skip(self, cancel), fields(instance_id = %self.instance_id))]
    async fn init(&self, cancel: &CancellationToken) -> CoreResult<()> {
        let _gate = self.lifecycle.init_gate(cancel).await?;
        if !self.lifecycle.begin_init() {
            return Ok(());
        }

        match self.scan(cancel).await {
            Ok(_) => {
                self.lifecycle.set_state(CoreState::Loaded);
                Ok(())
            }
            Err(LocalFilesError::Cancelled) => {
                self.lifecycle.set_state(CoreState::Unloaded);
                Err(CoreError::Cancelled)
            }
            Err(e) => {
                warn!(error = %e, "Local files core failed to load");
                self.lifecycle.set_state(CoreState::Faulted);
                Err(CoreError::Initialization(e.to_string()))
            }
        }
    }

    fn library(&self) -> Arc<dyn CollectionGroup> {
        self.library.clone()
    }

    fn search(&self) -> Option<Arc<dyn SearchCapability>> {
        Some(self.search.clone())
    }

    async fn media_source(
        &self,
        track: &CoreTrack,
        cancel: &CancellationToken,
    ) -> CoreResult<Option<MediaSource>> {
        if track.source.instance_id != self.instance_id {
            return Ok(None);
        }
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let record = self
            .stores()
            .tracks
            .get_item(&track.id)
            .await
            .map_err(LocalFilesError::from)?;
        Ok(record.and_then(|record| {
            let path = record.source_file?;
            Some(MediaSource {
                track: track.key(),
                uri: file_uri(&path),
                mime_type: record.mime_type,
            })
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<CoreChange> {
        self.lifecycle.subscribe()
    }

    async fn dispose(&self) -> CoreResult<()> {
        self.lifecycle.set_state(CoreState::Unloaded);
        Ok(())
    }
}
