//! The contract every music source implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use core_runtime::events::{GroupKind, ItemKind};

use crate::error::{CoreError, Result};
use crate::models::{
    CoreAlbum, CoreArtist, CoreImage, CorePlaylist, CoreTrack, Device, MediaSource, SearchResults,
};

/// Lifecycle of a core: `Unloaded → Loading → Loaded | Faulted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreState {
    Unloaded,
    Loading,
    Loaded,
    Faulted,
}

impl CoreState {
    fn as_u8(self) -> u8 {
        match self {
            CoreState::Unloaded => 0,
            CoreState::Loading => 1,
            CoreState::Loaded => 2,
            CoreState::Faulted => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CoreState::Loading,
            2 => CoreState::Loaded,
            3 => CoreState::Faulted,
            _ => CoreState::Unloaded,
        }
    }
}

/// Change notifications a core publishes on its own channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreChange {
    StateChanged(CoreState),
    DisplayNameChanged(String),
    DevicesChanged,
    /// Items of `kind` in `group` were added, removed or modified.
    CollectionChanged { group: GroupKind, kind: ItemKind },
}

/// A paginated collection group (library, recently played, ...) of one core.
///
/// `get_*` calls return at most `limit` items starting at `offset`. A page may
/// be shorter than `limit` while more items follow; only an empty page marks
/// the end of the collection.
#[async_trait]
pub trait CollectionGroup: Send + Sync {
    fn group(&self) -> GroupKind;

    async fn count(&self, kind: ItemKind) -> Result<usize>;

    async fn get_tracks(&self, offset: usize, limit: usize) -> Result<Vec<CoreTrack>>;

    async fn get_albums(&self, offset: usize, limit: usize) -> Result<Vec<CoreAlbum>>;

    async fn get_artists(&self, offset: usize, limit: usize) -> Result<Vec<CoreArtist>>;

    async fn get_playlists(&self, offset: usize, limit: usize) -> Result<Vec<CorePlaylist>>;

    async fn get_images(&self, _offset: usize, _limit: usize) -> Result<Vec<CoreImage>> {
        Ok(Vec::new())
    }

    /// Tracks belonging to the album, artist or playlist `parent_id`.
    async fn get_child_tracks(
        &self,
        _parent_kind: ItemKind,
        _parent_id: &str,
        _offset: usize,
        _limit: usize,
    ) -> Result<Vec<CoreTrack>> {
        Ok(Vec::new())
    }
}

#[async_trait]
pub trait SearchCapability: Send + Sync {
    async fn search(&self, query: &str, cancel: &CancellationToken) -> Result<SearchResults>;

    /// Auto-complete candidates for a partial query.
    async fn suggestions(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// A pluggable, independently initialized music source.
///
/// Optional capabilities return `None` when unsupported; callers treat that
/// as "not offered", never as an error.
#[async_trait]
pub trait Core: Send + Sync {
    /// Source type id, shared by every instance of the same source
    fn id(&self) -> &str;

    fn instance_id(&self) -> &str;

    fn display_name(&self) -> String;

    fn state(&self) -> CoreState;

    fn is_initialized(&self) -> bool {
        self.state() == CoreState::Loaded
    }

    /// Bring the core to `Loaded`.
    ///
    /// Returns immediately when already loaded. On failure the core is
    /// `Faulted` and the error is [`CoreError::Initialization`](crate::CoreError::Initialization),
    /// or [`CoreError::Cancelled`](crate::CoreError::Cancelled) if `cancel` fired first.
    async fn init(&self, cancel: &CancellationToken) -> Result<()>;

    fn library(&self) -> Arc<dyn CollectionGroup>;

    fn recently_played(&self) -> Option<Arc<dyn CollectionGroup>> {
        None
    }

    fn discoverables(&self) -> Option<Arc<dyn CollectionGroup>> {
        None
    }

    fn pins(&self) -> Option<Arc<dyn CollectionGroup>> {
        None
    }

    fn search(&self) -> Option<Arc<dyn SearchCapability>> {
        None
    }

    fn collection(&self, group: GroupKind) -> Option<Arc<dyn CollectionGroup>> {
        match group {
            GroupKind::Library => Some(self.library()),
            GroupKind::RecentlyPlayed => self.recently_played(),
            GroupKind::Discoverables => self.discoverables(),
            GroupKind::Pins => self.pins(),
        }
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        Ok(Vec::new())
    }

    /// Playable stream for `track`, or `None` if this core cannot play it.
    async fn media_source(
        &self,
        track: &CoreTrack,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaSource>>;

    fn subscribe(&self) -> broadcast::Receiver<CoreChange>;

    async fn dispose(&self) -> Result<()>;
}

/// State cell and change channel shared by core implementations.
///
/// Publishes [`CoreChange::StateChanged`] whenever the state actually changes.
///
/// `init` implementations hold [`CoreLifecycle::init_gate`] for the whole
/// initialization, so a concurrent caller waits for the outcome and never
/// observes `Loading`.
#[derive(Debug)]
pub struct CoreLifecycle {
    state: AtomicU8,
    changes: broadcast::Sender<CoreChange>,
    init_gate: Mutex<()>,
}

impl CoreLifecycle {
    pub fn new(buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(buffer.max(1));
        Self {
            state: AtomicU8::new(CoreState::Unloaded.as_u8()),
            changes,
            init_gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> CoreState {
        CoreState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: CoreState) {
        let previous = self.state.swap(state.as_u8(), Ordering::AcqRel);
        if previous != state.as_u8() {
            self.changes.send(CoreChange::StateChanged(state)).ok();
        }
    }

    /// Waits for any initialization in flight to finish.
    pub async fn init_gate(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, ()>> {
        tokio::select! {
            guard = self.init_gate.lock() => Ok(guard),
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
        }
    }

    /// Moves to `Loading` unless the core is already loaded or loading.
    ///
    /// Returns `false` when there is nothing to do. Call it while holding
    /// [`CoreLifecycle::init_gate`].
    pub fn begin_init(&self) -> bool {
        let current = self.state();
        if matches!(current, CoreState::Loaded | CoreState::Loading) {
            return false;
        }
        self.set_state(CoreState::Loading);
        true
    }

    pub fn publish(&self, change: CoreChange) {
        self.changes.send(change).ok();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreChange> {
        self.changes.subscribe()
    }
}

impl Default for CoreLifecycle {
    fn default() -> Self {
        Self::new(core_runtime::config::DEFAULT_EVENT_BUFFER_SIZE)
    }
}
