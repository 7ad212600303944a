//! Read access to one merged collection group.

use std::sync::Arc;

use core_contracts::{
    CollectionGroup, CoreAlbum, CoreArtist, CoreImage, CoreItem, CorePlaylist, CoreTrack,
    GroupKind, ItemKind,
};
use core_merge::{
    merge_sources, AlbumMerge, ArtistMerge, ImageMerge, Merged, PlaylistMerge, TrackMerge,
};
use futures::future::join_all;
use tracing::warn;

use crate::aggregator::Inner;
use crate::error::{Result, ServiceError};
use crate::groups::{fetch_chunked, GroupItems};

/// A merged collection group (library, recently played, ...) across every
/// loaded core.
///
/// Pages are served from the merged snapshot the aggregator keeps current;
/// paging never touches the cores. [`refresh`](Self::refresh) re-fetches.
#[derive(Clone)]
pub struct MergedGroupView {
    inner: Arc<Inner>,
    group: GroupKind,
}

impl MergedGroupView {
    pub(crate) fn new(inner: Arc<Inner>, group: GroupKind) -> Self {
        Self { inner, group }
    }

    pub fn group(&self) -> GroupKind {
        self.group
    }

    pub async fn count(&self, kind: ItemKind) -> usize {
        self.inner
            .groups
            .read()
            .await
            .get(&self.group)
            .map_or(0, |collections| collections.count(kind))
    }

    pub async fn tracks(&self, offset: usize, limit: usize) -> Vec<Merged<CoreTrack>> {
        self.page::<TrackMerge>(offset, limit).await
    }

    pub async fn albums(&self, offset: usize, limit: usize) -> Vec<Merged<CoreAlbum>> {
        self.page::<AlbumMerge>(offset, limit).await
    }

    pub async fn artists(&self, offset: usize, limit: usize) -> Vec<Merged<CoreArtist>> {
        self.page::<ArtistMerge>(offset, limit).await
    }

    pub async fn playlists(&self, offset: usize, limit: usize) -> Vec<Merged<CorePlaylist>> {
        self.page::<PlaylistMerge>(offset, limit).await
    }

    pub async fn images(&self, offset: usize, limit: usize) -> Vec<Merged<CoreImage>> {
        self.page::<ImageMerge>(offset, limit).await
    }

    async fn page<K: GroupItems>(&self, offset: usize, limit: usize) -> Vec<Merged<K::Item>> {
        self.inner
            .groups
            .read()
            .await
            .get(&self.group)
            .map(|collections| K::select(collections).page(offset, limit))
            .unwrap_or_default()
    }

    /// Re-fetch this group from every loaded core.
    ///
    /// Fails with [`ServiceError::AggregateSourceFailure`] when every core
    /// failed for some kind; the other kinds are still refreshed.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh_group(self.group).await
    }

    /// Tracks of a merged album, artist or playlist, fetched from each of
    /// its source cores and merged in source priority order.
    pub async fn child_tracks<T: CoreItem>(
        &self,
        parent: &Merged<T>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Merged<CoreTrack>>> {
        let parents = self.parent_sources(parent).await;
        let batch = self.inner.config.fetch_batch_size;

        let fetched = join_all(parents.iter().map(|(_, collection, parent_id)| {
            let collection = collection.as_ref();
            let parent_id = parent_id.as_str();
            fetch_chunked(batch, move |offset, limit| {
                collection.get_child_tracks(T::KIND, parent_id, offset, limit)
            })
        }))
        .await;

        let mut sources = Vec::with_capacity(parents.len());
        let mut errors = Vec::new();
        for ((instance_id, _, parent_id), outcome) in parents.iter().zip(fetched) {
            match outcome {
                Ok(tracks) => sources.push(tracks),
                Err(error) => {
                    warn!(
                        instance_id = %instance_id,
                        parent = %parent_id,
                        error = %error,
                        "Child track fetch failed"
                    );
                    errors.push(format!("{instance_id}: {error}"));
                }
            }
        }

        if !parents.is_empty() && errors.len() == parents.len() {
            return Err(ServiceError::all_failed(errors));
        }

        let merged = merge_sources(&TrackMerge::from_config(&self.inner.config), sources);
        Ok(merged.into_iter().skip(offset).take(limit).collect())
    }

    /// `(instance id, collection, item id)` for each source of `parent`
    /// whose core is loaded and offers this group.
    async fn parent_sources<T: CoreItem>(
        &self,
        parent: &Merged<T>,
    ) -> Vec<(String, Arc<dyn CollectionGroup>, String)> {
        let loaded = self.inner.loaded_cores().await;
        parent
            .sources()
            .iter()
            .filter_map(|item| {
                let core = loaded
                    .iter()
                    .find(|core| core.instance_id() == item.source().instance_id)?;
                let collection = core.collection(self.group)?;
                Some((
                    core.instance_id().to_string(),
                    collection,
                    item.id().to_string(),
                ))
            })
            .collect()
    }
}
