//! Writes scan results into the metadata repositories.
//!
//! Tracks are replaced outright. Albums and artists are shared between files,
//! so their relational fields are unioned with what is already stored instead
//! of overwritten. A retagged track is first detached from the album and
//! artists it no longer credits.

use core_library::models::{
    union_into, AlbumMetadata, ArtistMetadata, MetadataRecord, PlaylistMetadata, TrackMetadata,
};
use core_library::repositories::{InMemoryRepository, MetadataRepository, SqliteRepository};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::scanner::FileMetadata;

/// The four repositories a library is stored in.
#[derive(Clone)]
pub struct MetadataStores {
    pub tracks: Arc<dyn MetadataRepository<TrackMetadata>>,
    pub albums: Arc<dyn MetadataRepository<AlbumMetadata>>,
    pub artists: Arc<dyn MetadataRepository<ArtistMetadata>>,
    pub playlists: Arc<dyn MetadataRepository<PlaylistMetadata>>,
}

impl MetadataStores {
    pub fn in_memory() -> Self {
        Self {
            tracks: Arc::new(InMemoryRepository::<TrackMetadata>::new()),
            albums: Arc::new(InMemoryRepository::<AlbumMetadata>::new()),
            artists: Arc::new(InMemoryRepository::<ArtistMetadata>::new()),
            playlists: Arc::new(InMemoryRepository::<PlaylistMetadata>::new()),
        }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            tracks: Arc::new(SqliteRepository::<TrackMetadata>::new(pool.clone())),
            albums: Arc::new(SqliteRepository::<AlbumMetadata>::new(pool.clone())),
            artists: Arc::new(SqliteRepository::<ArtistMetadata>::new(pool.clone())),
            playlists: Arc::new(SqliteRepository::<PlaylistMetadata>::new(pool)),
        }
    }
}

/// Counts of records written by one [`MetadataIndexer::index`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub tracks: usize,
    pub albums: usize,
    pub artists: usize,
}

pub struct MetadataIndexer {
    stores: MetadataStores,
}

impl MetadataIndexer {
    pub fn new(stores: MetadataStores) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &MetadataStores {
        &self.stores
    }

    /// Store the records of every scanned file.
    pub async fn index(&self, files: &[FileMetadata]) -> Result<IndexSummary> {
        let tracks: Vec<TrackMetadata> = files.iter().map(|f| f.track.clone()).collect();
        self.detach_retagged(&tracks).await?;

        let mut albums: Vec<AlbumMetadata> = Vec::new();
        let mut album_slots: HashMap<String, usize> = HashMap::new();
        let mut artists: Vec<ArtistMetadata> = Vec::new();
        let mut artist_slots: HashMap<String, usize> = HashMap::new();

        for file in files {
            if let Some(album) = &file.album {
                collect(&mut albums, &mut album_slots, album.clone(), merge_album);
            }
            for artist in file.artists.iter().chain(&file.album_artists) {
                collect(&mut artists, &mut artist_slots, artist.clone(), merge_artist);
            }
        }

        let albums = self.with_stored(&*self.stores.albums, albums, merge_album).await?;
        let artists = self
            .with_stored(&*self.stores.artists, artists, merge_artist)
            .await?;

        let summary = IndexSummary {
            tracks: tracks.len(),
            albums: albums.len(),
            artists: artists.len(),
        };

        self.stores.tracks.add_or_update(tracks).await?;
        self.stores.albums.add_or_update(albums).await?;
        self.stores.artists.add_or_update(artists).await?;

        info!(
            tracks = summary.tracks,
            albums = summary.albums,
            artists = summary.artists,
            "Indexed scan results"
        );
        Ok(summary)
    }

    pub async fn index_playlists(&self, playlists: Vec<PlaylistMetadata>) -> Result<usize> {
        let count = playlists.len();
        self.stores.playlists.add_or_update(playlists).await?;
        Ok(count)
    }

    /// Remove tracks whose files disappeared and prune references to them.
    ///
    /// Albums and artists left without tracks are removed as well.
    pub async fn remove_tracks(&self, track_ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in track_ids {
            if self.stores.tracks.remove(id).await? {
                removed += 1;
            }
        }
        if removed == 0 {
            return Ok(0);
        }

        let gone: HashSet<&str> = track_ids.iter().map(String::as_str).collect();
        let (albums, artists) = self
            .unlink_tracks(|_, track| gone.contains(track), |_, track| gone.contains(track))
            .await?;
        debug!(removed, albums, artists, "Pruned removed tracks");
        Ok(removed)
    }

    /// Drop stored album and artist links that the new version of a track no
    /// longer has.
    async fn detach_retagged(&self, tracks: &[TrackMetadata]) -> Result<()> {
        let mut album_links: HashSet<(String, String)> = HashSet::new();
        let mut artist_links: HashSet<(String, String)> = HashSet::new();

        for track in tracks {
            let Some(previous) = self.stores.tracks.get_item(&track.id).await? else {
                continue;
            };
            if let Some(album_id) = previous.album_id {
                if track.album_id.as_ref() != Some(&album_id) {
                    album_links.insert((album_id, track.id.clone()));
                }
            }
            for artist_id in previous.artist_ids {
                if !track.artist_ids.contains(&artist_id) {
                    artist_links.insert((artist_id, track.id.clone()));
                }
            }
        }
        if album_links.is_empty() && artist_links.is_empty() {
            return Ok(());
        }

        let (albums, artists) = self
            .unlink_tracks(
                |album, track| album_links.contains(&(album.to_string(), track.to_string())),
                |artist, track| artist_links.contains(&(artist.to_string(), track.to_string())),
            )
            .await?;
        debug!(
            moved_from_albums = album_links.len(),
            moved_from_artists = artist_links.len(),
            albums,
            artists,
            "Detached retagged tracks"
        );
        Ok(())
    }

    /// Removes `(owner id, track id)` links matched by the predicates and
    /// deletes albums and artists left empty.
    ///
    /// Returns the number of albums and artists deleted.
    async fn unlink_tracks(
        &self,
        album_drops: impl Fn(&str, &str) -> bool,
        artist_drops: impl Fn(&str, &str) -> bool,
    ) -> Result<(usize, usize)> {
        let mut emptied_albums = Vec::new();
        let mut albums = Vec::new();
        for mut album in self.stores.albums.all().await? {
            let before = album.track_ids.len();
            let album_id = album.id.clone();
            album.track_ids.retain(|id| !album_drops(&album_id, id));
            if album.track_ids.is_empty() {
                emptied_albums.push(album.id);
            } else if album.track_ids.len() != before {
                albums.push(album);
            }
        }

        let mut emptied_artists = Vec::new();
        let mut artists = Vec::new();
        for mut artist in self.stores.artists.all().await? {
            let before = (artist.track_ids.len(), artist.album_ids.len());
            let artist_id = artist.id.clone();
            artist.track_ids.retain(|id| !artist_drops(&artist_id, id));
            artist.album_ids.retain(|id| !emptied_albums.contains(id));
            if artist.track_ids.is_empty() && artist.album_ids.is_empty() {
                emptied_artists.push(artist.id);
            } else if (artist.track_ids.len(), artist.album_ids.len()) != before {
                artists.push(artist);
            }
        }

        self.stores.albums.add_or_update(albums).await?;
        self.stores.artists.add_or_update(artists).await?;
        for id in &emptied_albums {
            self.stores.albums.remove(id).await?;
        }
        for id in &emptied_artists {
            self.stores.artists.remove(id).await?;
        }
        Ok((emptied_albums.len(), emptied_artists.len()))
    }

    async fn with_stored<R: MetadataRecord>(
        &self,
        repository: &dyn MetadataRepository<R>,
        records: Vec<R>,
        merge: fn(&mut R, R),
    ) -> Result<Vec<R>> {
        let mut merged = Vec::with_capacity(records.len());
        for record in records {
            match repository.get_item(record.id()).await? {
                Some(mut stored) => {
                    merge(&mut stored, record);
                    merged.push(stored);
                }
                None => merged.push(record),
            }
        }
        Ok(merged)
    }
}

fn collect<R: MetadataRecord>(
    records: &mut Vec<R>,
    slots: &mut HashMap<String, usize>,
    record: R,
    merge: fn(&mut R, R),
) {
    match slots.get(record.id()) {
        Some(&slot) => merge(&mut records[slot], record),
        None => {
            slots.insert(record.id().to_string(), records.len());
            records.push(record);
        }
    }
}

fn merge_album(target: &mut AlbumMetadata, incoming: AlbumMetadata) {
    union_into(&mut target.artist_ids, &incoming.artist_ids);
    union_into(&mut target.track_ids, &incoming.track_ids);
    union_into(&mut target.genres, &incoming.genres);
    for image in incoming.images {
        if !target.images.iter().any(|i| i.id == image.id) {
            target.images.push(image);
        }
    }
    target.title = target.title.take().or(incoming.title);
    target.year = target.year.or(incoming.year);
    target.disc_count = target.disc_count.max(incoming.disc_count);
}

fn merge_artist(target: &mut ArtistMetadata, incoming: ArtistMetadata) {
    union_into(&mut target.album_ids, &incoming.album_ids);
    union_into(&mut target.track_ids, &incoming.track_ids);
    union_into(&mut target.genres, &incoming.genres);
    target.name = target.name.take().or(incoming.name);
}
