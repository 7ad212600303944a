//! Per-group merged collections and per-kind fetch plumbing.

use core_contracts::{CollectionGroup, CoreItem, ItemKind, Result as CoreResult};
use core_merge::{
    AlbumMerge, ArtistMerge, ImageMerge, MergeKind, Merged, MergedCollection, PlaylistMerge,
    TrackMerge,
};
use core_runtime::events::ItemSummary;
use futures::future::BoxFuture;

/// Merged collections of one group, one per item kind.
pub(crate) struct GroupCollections {
    pub tracks: MergedCollection<TrackMerge>,
    pub albums: MergedCollection<AlbumMerge>,
    pub artists: MergedCollection<ArtistMerge>,
    pub playlists: MergedCollection<PlaylistMerge>,
    pub images: MergedCollection<ImageMerge>,
}

impl GroupCollections {
    pub fn new(track_merge: TrackMerge) -> Self {
        Self {
            tracks: MergedCollection::new(track_merge),
            albums: MergedCollection::new(AlbumMerge),
            artists: MergedCollection::new(ArtistMerge),
            playlists: MergedCollection::new(PlaylistMerge),
            images: MergedCollection::new(ImageMerge),
        }
    }

    pub fn count(&self, kind: ItemKind) -> usize {
        match kind {
            ItemKind::Track => self.tracks.len(),
            ItemKind::Album => self.albums.len(),
            ItemKind::Artist => self.artists.len(),
            ItemKind::Playlist => self.playlists.len(),
            ItemKind::Image => self.images.len(),
        }
    }
}

/// Ties a merge kind to the collection group call that lists its items.
pub(crate) trait GroupItems: MergeKind + Sized + 'static {
    const ITEM_KIND: ItemKind;

    fn fetch<'a>(
        group: &'a dyn CollectionGroup,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'a, CoreResult<Vec<Self::Item>>>;

    fn select(collections: &GroupCollections) -> &MergedCollection<Self>;

    fn select_mut(collections: &mut GroupCollections) -> &mut MergedCollection<Self>;
}

macro_rules! group_items {
    ($merge:ty, $kind:expr, $method:ident, $field:ident) => {
        impl GroupItems for $merge {
            const ITEM_KIND: ItemKind = $kind;

            fn fetch<'a>(
                group: &'a dyn CollectionGroup,
                offset: usize,
                limit: usize,
            ) -> BoxFuture<'a, CoreResult<Vec<Self::Item>>> {
                group.$method(offset, limit)
            }

            fn select(collections: &GroupCollections) -> &MergedCollection<Self> {
                &collections.$field
            }

            fn select_mut(collections: &mut GroupCollections) -> &mut MergedCollection<Self> {
                &mut collections.$field
            }
        }
    };
}

group_items!(TrackMerge, ItemKind::Track, get_tracks, tracks);
group_items!(AlbumMerge, ItemKind::Album, get_albums, albums);
group_items!(ArtistMerge, ItemKind::Artist, get_artists, artists);
group_items!(PlaylistMerge, ItemKind::Playlist, get_playlists, playlists);
group_items!(ImageMerge, ItemKind::Image, get_images, images);

/// Page through a source in `batch`-sized requests until an empty page.
///
/// A page shorter than `batch` does not end the collection; sources may cap
/// their page size.
pub(crate) async fn fetch_chunked<'a, T, F>(batch: usize, fetch: F) -> CoreResult<Vec<T>>
where
    F: Fn(usize, usize) -> BoxFuture<'a, CoreResult<Vec<T>>>,
{
    let batch = batch.max(1);
    let mut items = Vec::new();
    loop {
        let page = fetch(items.len(), batch).await?;
        if page.is_empty() {
            break;
        }
        items.extend(page);
    }
    Ok(items)
}

pub(crate) fn summary<T: CoreItem>(merged: &Merged<T>) -> ItemSummary {
    ItemSummary {
        key: merged.key().to_string(),
        name: merged.name(),
        source_count: merged.source_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_short_pages_do_not_end_the_collection() {
        let items: Vec<u32> = (0..7).collect();
        let fetched = fetch_chunked(5, |offset, limit| {
            let page: Vec<u32> = items.iter().skip(offset).take(limit.min(2)).copied().collect();
            async move { Ok(page) }.boxed()
        })
        .await
        .unwrap();
        assert_eq!(fetched, items);
    }
}
