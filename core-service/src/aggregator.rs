//! The aggregation root: owns the registered cores and their merged views.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use core_contracts::{
    CancellationToken, CollectionGroup, Core, CoreAlbum, CoreArtist, CoreChange, CoreError,
    CoreItem, CorePlaylist, CoreState, CoreTrack, GroupKind, ItemKind, MediaSource,
    SearchCapability, SearchResults,
};
use core_merge::{
    merge_sources, normalize_name, AlbumMerge, ArtistMerge, ChangeSet, ImageMerge, Merged,
    PlaylistMerge, TrackMerge,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, LifecycleEvent};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};
use crate::groups::{fetch_chunked, summary, GroupCollections, GroupItems};
use crate::plugins::{PluggedCore, PluginChain};
use crate::view::MergedGroupView;

/// Snapshot of one registered core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreInfo {
    pub instance_id: String,
    pub core_id: String,
    pub display_name: String,
    pub state: CoreState,
}

impl CoreInfo {
    /// `false` for cores the host should show as unavailable.
    pub fn is_available(&self) -> bool {
        self.state == CoreState::Loaded
    }
}

/// Search results of every core, deduplicated per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedSearchResults {
    pub tracks: Vec<Merged<CoreTrack>>,
    pub albums: Vec<Merged<CoreAlbum>>,
    pub artists: Vec<Merged<CoreArtist>>,
    pub playlists: Vec<Merged<CorePlaylist>>,
    /// Instance ids of cores whose search failed.
    pub failed_sources: Vec<String>,
}

impl MergedSearchResults {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
            && self.albums.is_empty()
            && self.artists.is_empty()
            && self.playlists.is_empty()
    }
}

struct Registered {
    core: Arc<dyn Core>,
    stop: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

pub(crate) struct Inner {
    pub(crate) config: CoreConfig,
    events: EventBus,
    plugins: Arc<PluginChain>,
    cores: RwLock<Vec<Registered>>,
    pub(crate) groups: RwLock<HashMap<GroupKind, GroupCollections>>,
    /// Serializes fetch and apply so two refreshes never interleave.
    refresh_gate: Mutex<()>,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Owns the connected cores and exposes their merged collection groups.
///
/// Cores are kept in registration order, which is also the source priority
/// used by every merge. A core only contributes while it is
/// [`Loaded`](CoreState::Loaded); faulted cores stay registered so hosts can
/// show them as unavailable.
///
/// ```rust,no_run
/// # async fn example(core: std::sync::Arc<dyn core_contracts::Core>) -> core_service::Result<()> {
/// use core_contracts::CancellationToken;
/// use core_runtime::config::CoreConfig;
/// use core_service::CoreAggregator;
///
/// let aggregator = CoreAggregator::from_config(CoreConfig::default());
/// aggregator.add_core(core, &CancellationToken::new()).await?;
///
/// for track in aggregator.library().tracks(0, 50).await {
///     println!("{} ({} sources)", track.name(), track.source_count());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CoreAggregator {
    inner: Arc<Inner>,
}

impl CoreAggregator {
    pub fn new(config: CoreConfig, events: EventBus, plugins: PluginChain) -> Self {
        let groups = GroupKind::ALL
            .into_iter()
            .map(|group| (group, GroupCollections::new(TrackMerge::from_config(&config))))
            .collect();

        Self {
            inner: Arc::new(Inner {
                config,
                events,
                plugins: Arc::new(plugins),
                cores: RwLock::new(Vec::new()),
                groups: RwLock::new(groups),
                refresh_gate: Mutex::new(()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Aggregator with its own event bus and no plugins.
    pub fn from_config(config: CoreConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        Self::new(config, events, PluginChain::new())
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Register and initialize a core.
    ///
    /// The core joins the merged views once initialized. If initialization
    /// fails the core stays registered as faulted and the error is returned;
    /// it rejoins when it reports `Loaded` on its change stream.
    #[instrument(skip(self, core, cancel), fields(instance_id = %core.instance_id()))]
    pub async fn add_core(&self, core: Arc<dyn Core>, cancel: &CancellationToken) -> Result<()> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(ServiceError::ShutDown);
        }

        let core: Arc<dyn Core> = if inner.plugins.is_empty() {
            core
        } else {
            Arc::new(PluggedCore::new(core, Arc::clone(&inner.plugins)))
        };
        let instance_id = core.instance_id().to_string();
        let stop = inner.shutdown.child_token();

        {
            let mut cores = inner.cores.write().await;
            if cores.iter().any(|r| r.core.instance_id() == instance_id) {
                return Err(ServiceError::DuplicateCore(instance_id));
            }
            cores.push(Registered {
                core: Arc::clone(&core),
                stop: stop.clone(),
                listener: None,
            });
        }
        inner.emit(CoreEvent::Lifecycle(LifecycleEvent::CoreAdded {
            instance_id: instance_id.clone(),
            core_id: core.id().to_string(),
            display_name: core.display_name(),
        }));

        let mut changes = core.subscribe();

        let init_cancel = stop.child_token();
        let init = core.init(&init_cancel);
        tokio::pin!(init);
        let outcome = tokio::select! {
            outcome = &mut init => outcome,
            _ = cancel.cancelled() => {
                init_cancel.cancel();
                init.await
            }
        };

        // State changes published during init are already reflected below.
        loop {
            match changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        let listener = tokio::spawn(listen(
            Arc::downgrade(inner),
            Arc::clone(&core),
            changes,
            stop,
        ));
        inner.attach_listener(&instance_id, listener).await;

        match outcome {
            Ok(()) => {
                info!("Core loaded");
                inner.emit(CoreEvent::Lifecycle(LifecycleEvent::CoreLoaded {
                    instance_id: instance_id.clone(),
                }));
                if let Err(error) = inner.refresh_all().await {
                    warn!(error = %error, "Merged views incomplete after adding core");
                }
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Core initialization failed");
                inner.emit(CoreEvent::Lifecycle(LifecycleEvent::CoreFaulted {
                    instance_id: instance_id.clone(),
                    message: error.to_string(),
                }));
                Err(match error {
                    CoreError::Cancelled => ServiceError::Cancelled,
                    other => ServiceError::Initialization(format!("{instance_id}: {other}")),
                })
            }
        }
    }

    /// Stop, dispose and unregister a core, then re-merge without it.
    ///
    /// Items only that core provided are reported as removed; items another
    /// core still provides are reported as updated.
    #[instrument(skip(self))]
    pub async fn remove_core(&self, instance_id: &str) -> Result<()> {
        let entry = {
            let mut cores = self.inner.cores.write().await;
            let index = cores
                .iter()
                .position(|r| r.core.instance_id() == instance_id)
                .ok_or_else(|| ServiceError::CoreNotFound(instance_id.to_string()))?;
            cores.remove(index)
        };

        self.inner.release(entry).await;
        self.inner.emit(CoreEvent::Lifecycle(LifecycleEvent::CoreRemoved {
            instance_id: instance_id.to_string(),
        }));
        info!("Core removed");

        if let Err(error) = self.inner.refresh_all().await {
            warn!(error = %error, "Merged views incomplete after removing core");
        }
        Ok(())
    }

    /// Registered cores in priority order.
    pub async fn cores(&self) -> Vec<CoreInfo> {
        self.inner
            .cores
            .read()
            .await
            .iter()
            .map(|r| CoreInfo {
                instance_id: r.core.instance_id().to_string(),
                core_id: r.core.id().to_string(),
                display_name: r.core.display_name(),
                state: r.core.state(),
            })
            .collect()
    }

    pub fn library(&self) -> MergedGroupView {
        self.group(GroupKind::Library)
    }

    pub fn recently_played(&self) -> MergedGroupView {
        self.group(GroupKind::RecentlyPlayed)
    }

    pub fn discoverables(&self) -> MergedGroupView {
        self.group(GroupKind::Discoverables)
    }

    pub fn pins(&self) -> MergedGroupView {
        self.group(GroupKind::Pins)
    }

    pub fn group(&self, group: GroupKind) -> MergedGroupView {
        MergedGroupView::new(Arc::clone(&self.inner), group)
    }

    /// Re-fetch every group from every loaded core.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh_all().await
    }

    /// Query every loaded core that can search, concurrently.
    ///
    /// Cores that fail are listed in
    /// [`failed_sources`](MergedSearchResults::failed_sources); the call
    /// only fails when every attempted core did.
    #[instrument(skip(self, cancel))]
    pub async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<MergedSearchResults> {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let searchers = self.inner.searchers().await;
        let outcomes = join_all(searchers.iter().map(|(_, search)| async move {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            search.search(query, cancel).await
        }))
        .await;

        let mut results = Vec::with_capacity(searchers.len());
        let mut failed_sources = Vec::new();
        let mut errors = Vec::new();
        for ((instance_id, _), outcome) in searchers.iter().zip(outcomes) {
            match outcome {
                Ok(found) => results.push(found),
                Err(error) => {
                    warn!(instance_id = %instance_id, error = %error, "Core search failed");
                    errors.push(format!("{instance_id}: {error}"));
                    failed_sources.push(instance_id.clone());
                }
            }
        }

        if !searchers.is_empty() && results.is_empty() {
            return Err(if cancel.is_cancelled() {
                ServiceError::Cancelled
            } else {
                ServiceError::all_failed(errors)
            });
        }

        let merged = merge_search(&self.inner.config, results, failed_sources);
        debug!(
            tracks = merged.tracks.len(),
            albums = merged.albums.len(),
            artists = merged.artists.len(),
            playlists = merged.playlists.len(),
            "Search merged"
        );
        Ok(merged)
    }

    /// Auto-complete candidates from every searchable core, deduplicated by
    /// normalized text in priority order.
    pub async fn suggestions(&self, query: &str) -> Result<Vec<String>> {
        let searchers = self.inner.searchers().await;
        let outcomes = join_all(
            searchers
                .iter()
                .map(|(_, search)| async move { search.suggestions(query).await }),
        )
        .await;

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        let mut errors = Vec::new();
        for ((instance_id, _), outcome) in searchers.iter().zip(outcomes) {
            match outcome {
                Ok(candidates) => {
                    for candidate in candidates {
                        if seen.insert(normalize_name(&candidate)) {
                            suggestions.push(candidate);
                        }
                    }
                }
                Err(error) => {
                    warn!(instance_id = %instance_id, error = %error, "Core suggestions failed");
                    errors.push(format!("{instance_id}: {error}"));
                }
            }
        }

        if !searchers.is_empty() && errors.len() == searchers.len() {
            return Err(ServiceError::all_failed(errors));
        }
        Ok(suggestions)
    }

    /// Ask each source of `track` in priority order for a playable stream.
    ///
    /// The first core that returns one wins. Sources whose core is not
    /// loaded are skipped.
    #[instrument(skip(self, track, cancel), fields(track = %track.key()))]
    pub async fn media_source(
        &self,
        track: &Merged<CoreTrack>,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaSource>> {
        let loaded = self.inner.loaded_cores().await;
        let mut attempted = 0;
        let mut errors = Vec::new();

        for source in track.sources() {
            if cancel.is_cancelled() {
                return Err(ServiceError::Cancelled);
            }
            let Some(core) = loaded
                .iter()
                .find(|core| core.instance_id() == source.source.instance_id)
            else {
                continue;
            };

            attempted += 1;
            match core.media_source(source, cancel).await {
                Ok(Some(media)) => return Ok(Some(media)),
                Ok(None) => {}
                Err(error) => {
                    warn!(instance_id = %core.instance_id(), error = %error, "Media source failed");
                    errors.push(format!("{}: {error}", core.instance_id()));
                }
            }
        }

        if attempted > 0 && errors.len() == attempted {
            return Err(ServiceError::all_failed(errors));
        }
        Ok(None)
    }

    /// Stop every listener and dispose every core. Later calls to
    /// [`add_core`](Self::add_core) fail with [`ServiceError::ShutDown`].
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let entries = std::mem::take(&mut *self.inner.cores.write().await);
        let count = entries.len();
        for entry in entries {
            self.inner.release(entry).await;
        }
        info!(cores = count, "Aggregator shut down");
    }
}

impl Inner {
    fn emit(&self, event: CoreEvent) {
        self.events.emit(event).ok();
    }

    async fn attach_listener(&self, instance_id: &str, listener: JoinHandle<()>) {
        let mut cores = self.cores.write().await;
        // A concurrent remove already cancelled the listener's token.
        if let Some(entry) = cores.iter_mut().find(|r| r.core.instance_id() == instance_id) {
            entry.listener = Some(listener);
        }
    }

    async fn release(&self, entry: Registered) {
        entry.stop.cancel();
        if let Some(listener) = entry.listener {
            if let Err(error) = listener.await {
                warn!(instance_id = %entry.core.instance_id(), error = %error, "Core listener panicked");
            }
        }
        if let Err(error) = entry.core.dispose().await {
            warn!(instance_id = %entry.core.instance_id(), error = %error, "Core dispose failed");
        }
    }

    /// Loaded cores in priority order.
    pub(crate) async fn loaded_cores(&self) -> Vec<Arc<dyn Core>> {
        self.cores
            .read()
            .await
            .iter()
            .filter(|r| r.core.state() == CoreState::Loaded)
            .map(|r| Arc::clone(&r.core))
            .collect()
    }

    async fn searchers(&self) -> Vec<(String, Arc<dyn SearchCapability>)> {
        self.loaded_cores()
            .await
            .into_iter()
            .filter_map(|core| Some((core.instance_id().to_string(), core.search()?)))
            .collect()
    }

    async fn collections(&self, group: GroupKind) -> Vec<(String, Arc<dyn CollectionGroup>)> {
        self.loaded_cores()
            .await
            .into_iter()
            .filter_map(|core| Some((core.instance_id().to_string(), core.collection(group)?)))
            .collect()
    }

    /// Re-fetch one kind of one group from every loaded core and apply it.
    ///
    /// A core whose fetch fails keeps its last snapshot. Fails when every
    /// attempted core failed, after applying what is left.
    async fn refresh_kind<K: GroupItems>(&self, group: GroupKind) -> Result<()> {
        let _gate = self.refresh_gate.lock().await;

        let sources = self.collections(group).await;
        let batch = self.config.fetch_batch_size;
        let fetched = join_all(sources.iter().map(|(_, collection)| {
            let collection = collection.as_ref();
            fetch_chunked(batch, move |offset, limit| {
                K::fetch(collection, offset, limit)
            })
        }))
        .await;

        let mut groups = self.groups.write().await;
        let Some(collections) = groups.get_mut(&group) else {
            return Ok(());
        };
        let collection = K::select_mut(collections);

        let mut snapshots = Vec::with_capacity(sources.len());
        let mut errors = Vec::new();
        for ((instance_id, _), outcome) in sources.iter().zip(fetched) {
            match outcome {
                Ok(items) => snapshots.push((instance_id.clone(), items)),
                Err(error) => {
                    warn!(
                        instance_id = %instance_id,
                        group = %group,
                        kind = %K::ITEM_KIND,
                        error = %error,
                        "Collection fetch failed"
                    );
                    self.emit(CoreEvent::Library(LibraryEvent::SourceFailed {
                        group,
                        kind: K::ITEM_KIND,
                        instance_id: instance_id.clone(),
                        message: error.to_string(),
                    }));
                    errors.push(format!("{instance_id}: {error}"));
                    if let Some(previous) = collection.source_items(instance_id) {
                        snapshots.push((instance_id.clone(), previous.to_vec()));
                    }
                }
            }
        }

        let changes = collection.set_sources(snapshots);
        self.publish(group, K::ITEM_KIND, &changes);

        if !sources.is_empty() && errors.len() == sources.len() {
            return Err(ServiceError::all_failed(errors));
        }
        Ok(())
    }

    fn publish<T: CoreItem>(&self, group: GroupKind, kind: ItemKind, changes: &ChangeSet<T>) {
        if changes.is_empty() {
            return;
        }
        debug!(
            group = %group,
            kind = %kind,
            added = changes.added.len(),
            removed = changes.removed.len(),
            updated = changes.updated.len(),
            "Merged collection changed"
        );
        self.emit(CoreEvent::Library(LibraryEvent::Changed {
            group,
            kind,
            added: changes.added.iter().map(summary).collect(),
            removed: changes.removed.iter().map(summary).collect(),
            updated: changes.updated.iter().map(summary).collect(),
        }));
    }

    pub(crate) async fn refresh_item_kind(&self, group: GroupKind, kind: ItemKind) -> Result<()> {
        match kind {
            ItemKind::Track => self.refresh_kind::<TrackMerge>(group).await,
            ItemKind::Album => self.refresh_kind::<AlbumMerge>(group).await,
            ItemKind::Artist => self.refresh_kind::<ArtistMerge>(group).await,
            ItemKind::Playlist => self.refresh_kind::<PlaylistMerge>(group).await,
            ItemKind::Image => self.refresh_kind::<ImageMerge>(group).await,
        }
    }

    /// Refresh every kind of `group`; returns the first failure after
    /// trying them all.
    pub(crate) async fn refresh_group(&self, group: GroupKind) -> Result<()> {
        let mut first_error = None;
        for kind in ItemKind::ALL {
            if let Err(error) = self.refresh_item_kind(group, kind).await {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn refresh_all(&self) -> Result<()> {
        let mut first_error = None;
        for group in GroupKind::ALL {
            if let Err(error) = self.refresh_group(group).await {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn handle_change(&self, instance_id: &str, change: CoreChange) {
        let refreshed = match change {
            CoreChange::StateChanged(state) => {
                match state {
                    CoreState::Loaded => {
                        info!(instance_id, "Core recovered");
                        self.emit(CoreEvent::Lifecycle(LifecycleEvent::CoreLoaded {
                            instance_id: instance_id.to_string(),
                        }));
                    }
                    CoreState::Faulted => {
                        warn!(instance_id, "Core faulted");
                        self.emit(CoreEvent::Lifecycle(LifecycleEvent::CoreFaulted {
                            instance_id: instance_id.to_string(),
                            message: "core reported a fault".to_string(),
                        }));
                    }
                    CoreState::Unloaded | CoreState::Loading => {}
                }
                if state == CoreState::Loading {
                    return;
                }
                self.refresh_all().await
            }
            CoreChange::CollectionChanged { group, kind } => {
                debug!(instance_id, group = %group, kind = %kind, "Core collection changed");
                self.refresh_item_kind(group, kind).await
            }
            CoreChange::DisplayNameChanged(display_name) => {
                self.emit(CoreEvent::Lifecycle(LifecycleEvent::DisplayNameChanged {
                    instance_id: instance_id.to_string(),
                    display_name,
                }));
                return;
            }
            CoreChange::DevicesChanged => {
                self.emit(CoreEvent::Lifecycle(LifecycleEvent::DevicesChanged {
                    instance_id: instance_id.to_string(),
                }));
                return;
            }
        };

        if let Err(error) = refreshed {
            warn!(instance_id, error = %error, "Re-merge after core change failed");
        }
    }
}

/// Forward one core's change stream into the aggregator until stopped.
async fn listen(
    inner: Weak<Inner>,
    core: Arc<dyn Core>,
    mut changes: broadcast::Receiver<CoreChange>,
    stop: CancellationToken,
) {
    let instance_id = core.instance_id().to_string();
    loop {
        let received = tokio::select! {
            _ = stop.cancelled() => break,
            received = changes.recv() => received,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };

        match received {
            Ok(change) => inner.handle_change(&instance_id, change).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!(instance_id = %instance_id, skipped, "Core change stream lagged, re-merging");
                if let Err(error) = inner.refresh_all().await {
                    warn!(instance_id = %instance_id, error = %error, "Re-merge after lag failed");
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!(instance_id = %instance_id, "Core listener stopped");
}

fn merge_search(
    config: &CoreConfig,
    results: Vec<SearchResults>,
    failed_sources: Vec<String>,
) -> MergedSearchResults {
    let mut tracks = Vec::with_capacity(results.len());
    let mut albums = Vec::with_capacity(results.len());
    let mut artists = Vec::with_capacity(results.len());
    let mut playlists = Vec::with_capacity(results.len());
    for found in results {
        tracks.push(found.tracks);
        albums.push(found.albums);
        artists.push(found.artists);
        playlists.push(found.playlists);
    }

    MergedSearchResults {
        tracks: merge_sources(&TrackMerge::from_config(config), tracks),
        albums: merge_sources(&AlbumMerge, albums),
        artists: merge_sources(&ArtistMerge, artists),
        playlists: merge_sources(&PlaylistMerge, playlists),
        failed_sources,
    }
}
