//! # Plugins
//!
//! Behaviour injected around cores without changing the [`Core`] contract.
//!
//! A [`CorePlugin`] gets a chance to rewrite every item a core returns and
//! every media source it resolves. Plugins are chained in registration order
//! by [`PluginChain`]; [`PluggedCore`] applies a chain to one core, wrapping
//! its collection groups and search capability as well.
//!
//! A plugin that fails is logged and skipped: the item it was given is
//! passed on unchanged.

use async_trait::async_trait;
use core_contracts::{
    CancellationToken, CollectionGroup, Core, CoreAlbum, CoreArtist, CoreChange, CoreImage,
    CorePlaylist, CoreState, CoreTrack, Device, GroupKind, ItemKind, MediaSource, Result,
    SearchCapability, SearchResults, SourceRef,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Plugin {plugin} failed: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Hooks applied to data a core returns. Every hook defaults to a no-op.
pub trait CorePlugin: Send + Sync {
    fn name(&self) -> &str;

    fn decorate_track(&self, track: CoreTrack) -> PluginResult<CoreTrack> {
        Ok(track)
    }

    fn decorate_album(&self, album: CoreAlbum) -> PluginResult<CoreAlbum> {
        Ok(album)
    }

    fn decorate_artist(&self, artist: CoreArtist) -> PluginResult<CoreArtist> {
        Ok(artist)
    }

    fn decorate_playlist(&self, playlist: CorePlaylist) -> PluginResult<CorePlaylist> {
        Ok(playlist)
    }

    /// Override or replace the media source resolved for `track`.
    fn media_source(
        &self,
        _track: &CoreTrack,
        source: Option<MediaSource>,
    ) -> PluginResult<Option<MediaSource>> {
        Ok(source)
    }
}

/// Plugins applied in registration order.
#[derive(Clone, Default)]
pub struct PluginChain {
    plugins: Vec<Arc<dyn CorePlugin>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, plugin: Arc<dyn CorePlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn register(&mut self, plugin: Arc<dyn CorePlugin>) {
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    fn apply<T: Clone>(&self, item: T, hook: impl Fn(&dyn CorePlugin, T) -> PluginResult<T>) -> T {
        self.plugins.iter().fold(item, |item, plugin| {
            match hook(plugin.as_ref(), item.clone()) {
                Ok(decorated) => decorated,
                Err(e) => {
                    warn!(plugin = plugin.name(), error = %e, "Plugin failed, passing item through");
                    item
                }
            }
        })
    }

    pub fn track(&self, track: CoreTrack) -> CoreTrack {
        self.apply(track, |p, t| p.decorate_track(t))
    }

    pub fn album(&self, album: CoreAlbum) -> CoreAlbum {
        self.apply(album, |p, a| p.decorate_album(a))
    }

    pub fn artist(&self, artist: CoreArtist) -> CoreArtist {
        self.apply(artist, |p, a| p.decorate_artist(a))
    }

    pub fn playlist(&self, playlist: CorePlaylist) -> CorePlaylist {
        self.apply(playlist, |p, pl| p.decorate_playlist(pl))
    }

    pub fn media_source(&self, track: &CoreTrack, source: Option<MediaSource>) -> Option<MediaSource> {
        self.apply(source, |p, s| p.media_source(track, s))
    }

    pub fn search_results(&self, results: SearchResults) -> SearchResults {
        SearchResults {
            tracks: results.tracks.into_iter().map(|t| self.track(t)).collect(),
            albums: results.albums.into_iter().map(|a| self.album(a)).collect(),
            artists: results.artists.into_iter().map(|a| self.artist(a)).collect(),
            playlists: results
                .playlists
                .into_iter()
                .map(|p| self.playlist(p))
                .collect(),
        }
    }
}

// =============================================================================
// Decorators
// =============================================================================

/// A [`Core`] whose returned items pass through a [`PluginChain`].
pub struct PluggedCore {
    inner: Arc<dyn Core>,
    chain: Arc<PluginChain>,
}

impl PluggedCore {
    pub fn new(inner: Arc<dyn Core>, chain: Arc<PluginChain>) -> Self {
        Self { inner, chain }
    }

    pub fn inner(&self) -> &Arc<dyn Core> {
        &self.inner
    }

    fn wrap_group(&self, group: Arc<dyn CollectionGroup>) -> Arc<dyn CollectionGroup> {
        Arc::new(PluggedGroup {
            inner: group,
            chain: Arc::clone(&self.chain),
        })
    }
}

#[async_trait]
impl Core for PluggedCore {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn instance_id(&self) -> &str {
        self.inner.instance_id()
    }

    fn display_name(&self) -> String {
        self.inner.display_name()
    }

    fn state(&self) -> CoreState {
        self.inner.state()
    }

    async fn init(&self, cancel: &CancellationToken) -> Result<()> {
        self.inner.init(cancel).await
    }

    fn library(&self) -> Arc<dyn CollectionGroup> {
        self.wrap_group(self.inner.library())
    }

    fn recently_played(&self) -> Option<Arc<dyn CollectionGroup>> {
        self.inner.recently_played().map(|g| self.wrap_group(g))
    }

    fn discoverables(&self) -> Option<Arc<dyn CollectionGroup>> {
        self.inner.discoverables().map(|g| self.wrap_group(g))
    }

    fn pins(&self) -> Option<Arc<dyn CollectionGroup>> {
        self.inner.pins().map(|g| self.wrap_group(g))
    }

    fn search(&self) -> Option<Arc<dyn SearchCapability>> {
        self.inner.search().map(|search| {
            Arc::new(PluggedSearch {
                inner: search,
                chain: Arc::clone(&self.chain),
            }) as Arc<dyn SearchCapability>
        })
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        self.inner.devices().await
    }

    async fn media_source(
        &self,
        track: &CoreTrack,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaSource>> {
        let source = self.inner.media_source(track, cancel).await?;
        Ok(self.chain.media_source(track, source))
    }

    fn subscribe(&self) -> broadcast::Receiver<CoreChange> {
        self.inner.subscribe()
    }

    async fn dispose(&self) -> Result<()> {
        self.inner.dispose().await
    }
}

struct PluggedGroup {
    inner: Arc<dyn CollectionGroup>,
    chain: Arc<PluginChain>,
}

#[async_trait]
impl CollectionGroup for PluggedGroup {
    fn group(&self) -> GroupKind {
        self.inner.group()
    }

    async fn count(&self, kind: ItemKind) -> Result<usize> {
        self.inner.count(kind).await
    }

    async fn get_tracks(&self, offset: usize, limit: usize) -> Result<Vec<CoreTrack>> {
        let tracks = self.inner.get_tracks(offset, limit).await?;
        Ok(tracks.into_iter().map(|t| self.chain.track(t)).collect())
    }

    async fn get_albums(&self, offset: usize, limit: usize) -> Result<Vec<CoreAlbum>> {
        let albums = self.inner.get_albums(offset, limit).await?;
        Ok(albums.into_iter().map(|a| self.chain.album(a)).collect())
    }

    async fn get_artists(&self, offset: usize, limit: usize) -> Result<Vec<CoreArtist>> {
        let artists = self.inner.get_artists(offset, limit).await?;
        Ok(artists.into_iter().map(|a| self.chain.artist(a)).collect())
    }

    async fn get_playlists(&self, offset: usize, limit: usize) -> Result<Vec<CorePlaylist>> {
        let playlists = self.inner.get_playlists(offset, limit).await?;
        Ok(playlists.into_iter().map(|p| self.chain.playlist(p)).collect())
    }

    async fn get_images(&self, offset: usize, limit: usize) -> Result<Vec<CoreImage>> {
        self.inner.get_images(offset, limit).await
    }

    async fn get_child_tracks(
        &self,
        parent_kind: ItemKind,
        parent_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CoreTrack>> {
        let tracks = self
            .inner
            .get_child_tracks(parent_kind, parent_id, offset, limit)
            .await?;
        Ok(tracks.into_iter().map(|t| self.chain.track(t)).collect())
    }
}

struct PluggedSearch {
    inner: Arc<dyn SearchCapability>,
    chain: Arc<PluginChain>,
}

#[async_trait]
impl SearchCapability for PluggedSearch {
    async fn search(&self, query: &str, cancel: &CancellationToken) -> Result<SearchResults> {
        let results = self.inner.search(query, cancel).await?;
        Ok(self.chain.search_results(results))
    }

    async fn suggestions(&self, query: &str) -> Result<Vec<String>> {
        self.inner.suggestions(query).await
    }
}

// =============================================================================
// Built-in plugins
// =============================================================================

/// Gives items without artwork a placeholder image.
pub struct FallbackImagePlugin {
    uri: String,
}

impl FallbackImagePlugin {
    pub const IMAGE_ID: &'static str = "fallback-image";

    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    fn fill(&self, images: &mut Vec<CoreImage>, source: &SourceRef) {
        if images.is_empty() {
            images.push(CoreImage::new(source.clone(), Self::IMAGE_ID, self.uri.clone()));
        }
    }
}

impl CorePlugin for FallbackImagePlugin {
    fn name(&self) -> &str {
        "fallback-image"
    }

    fn decorate_track(&self, mut track: CoreTrack) -> PluginResult<CoreTrack> {
        self.fill(&mut track.images, &track.source);
        Ok(track)
    }

    fn decorate_album(&self, mut album: CoreAlbum) -> PluginResult<CoreAlbum> {
        self.fill(&mut album.images, &album.source);
        Ok(album)
    }

    fn decorate_artist(&self, mut artist: CoreArtist) -> PluginResult<CoreArtist> {
        self.fill(&mut artist.images, &artist.source);
        Ok(artist)
    }

    fn decorate_playlist(&self, mut playlist: CorePlaylist) -> PluginResult<CorePlaylist> {
        self.fill(&mut playlist.images, &playlist.source);
        Ok(playlist)
    }
}

/// Trims names and collapses runs of whitespace.
pub struct TitleCleanupPlugin;

impl TitleCleanupPlugin {
    fn clean(name: &str) -> String {
        name.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl CorePlugin for TitleCleanupPlugin {
    fn name(&self) -> &str {
        "title-cleanup"
    }

    fn decorate_track(&self, mut track: CoreTrack) -> PluginResult<CoreTrack> {
        track.name = Self::clean(&track.name);
        track.album_name = track.album_name.as_deref().map(Self::clean);
        track.artist_names = track.artist_names.iter().map(|n| Self::clean(n)).collect();
        Ok(track)
    }

    fn decorate_album(&self, mut album: CoreAlbum) -> PluginResult<CoreAlbum> {
        album.name = Self::clean(&album.name);
        Ok(album)
    }

    fn decorate_artist(&self, mut artist: CoreArtist) -> PluginResult<CoreArtist> {
        artist.name = Self::clean(&artist.name);
        Ok(artist)
    }

    fn decorate_playlist(&self, mut playlist: CorePlaylist) -> PluginResult<CorePlaylist> {
        playlist.name = Self::clean(&playlist.name);
        Ok(playlist)
    }
}
