//! The library collection group over the metadata repositories.

use async_trait::async_trait;
use core_contracts::{
    CollectionGroup, CoreAlbum, CoreArtist, CorePlaylist, CoreTrack, GroupKind, ItemKind,
    Result as CoreResult, SourceRef,
};
use core_library::models::{
    ordering_key, AlbumMetadata, ArtistMetadata, PlaylistMetadata, TrackMetadata,
};
use core_library::{LibraryError, MetadataRepository};
use core_metadata::MetadataStores;
use std::collections::HashMap;

use crate::error::{LocalFilesError, Result};

const UNKNOWN_ALBUM: &str = "Unknown Album";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Converts stored records into core items, resolving album and artist
/// names through the repositories.
#[derive(Clone)]
pub(crate) struct RecordMapper {
    stores: MetadataStores,
    source: SourceRef,
}

impl RecordMapper {
    pub fn new(stores: MetadataStores, source: SourceRef) -> Self {
        Self { stores, source }
    }

    pub fn stores(&self) -> &MetadataStores {
        &self.stores
    }

    pub async fn tracks(&self, records: Vec<TrackMetadata>) -> Result<Vec<CoreTrack>> {
        let mut albums: HashMap<String, Option<String>> = HashMap::new();
        let mut artists: HashMap<String, String> = HashMap::new();
        let mut tracks = Vec::with_capacity(records.len());

        for record in records {
            let album_name = match &record.album_id {
                Some(id) => {
                    if !albums.contains_key(id) {
                        let title = self.stores.albums.get_item(id).await?.and_then(|a| a.title);
                        albums.insert(id.clone(), title);
                    }
                    albums.get(id).cloned().flatten()
                }
                None => None,
            };

            let mut artist_names = Vec::with_capacity(record.artist_ids.len());
            for id in &record.artist_ids {
                if !artists.contains_key(id) {
                    let name = self
                        .stores
                        .artists
                        .get_item(id)
                        .await?
                        .and_then(|a| a.name)
                        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
                    artists.insert(id.clone(), name);
                }
                artist_names.push(artists.get(id).cloned().unwrap_or_default());
            }

            tracks.push(self.track(record, album_name, artist_names));
        }
        Ok(tracks)
    }

    fn track(
        &self,
        record: TrackMetadata,
        album_name: Option<String>,
        artist_names: Vec<String>,
    ) -> CoreTrack {
        let name = record
            .title
            .clone()
            .or_else(|| record.source_file.as_deref().map(file_name))
            .unwrap_or_default();

        CoreTrack {
            description: record.comment,
            duration: record.duration,
            track_number: record.track_number,
            disc_number: record.disc_number,
            album_id: record.album_id,
            album_name,
            artist_ids: record.artist_ids,
            artist_names,
            genres: record.genres,
            year: record.year,
            ..CoreTrack::new(self.source.clone(), record.id, name)
        }
    }

    pub async fn album(&self, record: AlbumMetadata) -> Result<CoreAlbum> {
        let mut artist_names = Vec::with_capacity(record.artist_ids.len());
        for id in &record.artist_ids {
            if let Some(name) = self.stores.artists.get_item(id).await?.and_then(|a| a.name) {
                artist_names.push(name);
            }
        }

        Ok(CoreAlbum {
            year: record.year,
            artist_names,
            genres: record.genres,
            total_tracks: record.track_ids.len(),
            ..CoreAlbum::new(
                self.source.clone(),
                record.id,
                record.title.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            )
        })
    }

    pub fn artist(&self, record: ArtistMetadata) -> CoreArtist {
        CoreArtist {
            genres: record.genres,
            total_tracks: record.track_ids.len(),
            total_albums: record.album_ids.len(),
            ..CoreArtist::new(
                self.source.clone(),
                record.id,
                record.name.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            )
        }
    }

    pub fn playlist(&self, record: PlaylistMetadata) -> CorePlaylist {
        let name = record
            .title
            .clone()
            .or_else(|| record.source_file.as_deref().map(file_name))
            .unwrap_or_default();
        CorePlaylist {
            description: record.description,
            total_tracks: record.track_ids.len(),
            ..CorePlaylist::new(self.source.clone(), record.id, name)
        }
    }

    /// Track records for `ids`, skipping ids that were never scanned.
    async fn track_records(&self, ids: &[String]) -> Result<Vec<TrackMetadata>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.stores.tracks.get_item(id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Tracks of an album (disc and track order), artist or playlist
    /// (entry order).
    pub async fn child_tracks(
        &self,
        parent_kind: ItemKind,
        parent_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CoreTrack>> {
        let not_found = || {
            LocalFilesError::Library(LibraryError::NotFound {
                entity_type: parent_kind.to_string(),
                id: parent_id.to_string(),
            })
        };

        let records: Vec<TrackMetadata> = match parent_kind {
            ItemKind::Album => {
                let album = self.stores.albums.get_item(parent_id).await?.ok_or_else(not_found)?;
                let records = self.track_records(&album.track_ids).await?;
                let mut keyed: Vec<_> = records
                    .into_iter()
                    .enumerate()
                    .map(|(seq, record)| (ordering_key(&record, seq as u64), record))
                    .collect();
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
                keyed.into_iter().map(|(_, record)| record).collect()
            }
            ItemKind::Artist => {
                let artist = self.stores.artists.get_item(parent_id).await?.ok_or_else(not_found)?;
                self.track_records(&artist.track_ids).await?
            }
            ItemKind::Playlist => {
                let playlist = self
                    .stores
                    .playlists
                    .get_item(parent_id)
                    .await?
                    .ok_or_else(not_found)?;
                self.track_records(&playlist.track_ids).await?
            }
            ItemKind::Track | ItemKind::Image => return Ok(Vec::new()),
        };

        let page: Vec<_> = records.into_iter().skip(offset).take(limit).collect();
        self.tracks(page).await
    }
}

fn file_name(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
        .to_string()
}

/// Library group of a [`LocalFilesCore`](crate::LocalFilesCore).
pub struct LocalLibrary {
    mapper: RecordMapper,
}

impl LocalLibrary {
    pub(crate) fn new(mapper: RecordMapper) -> Self {
        Self { mapper }
    }
}

#[async_trait]
impl CollectionGroup for LocalLibrary {
    fn group(&self) -> GroupKind {
        GroupKind::Library
    }

    async fn count(&self, kind: ItemKind) -> CoreResult<usize> {
        let stores = self.mapper.stores();
        let count = match kind {
            ItemKind::Track => stores.tracks.count().await,
            ItemKind::Album => stores.albums.count().await,
            ItemKind::Artist => stores.artists.count().await,
            ItemKind::Playlist => stores.playlists.count().await,
            ItemKind::Image => Ok(0),
        };
        Ok(count.map_err(LocalFilesError::from)?)
    }

    async fn get_tracks(&self, offset: usize, limit: usize) -> CoreResult<Vec<CoreTrack>> {
        let records = self
            .mapper
            .stores()
            .tracks
            .get_items(offset, limit)
            .await
            .map_err(LocalFilesError::from)?;
        Ok(self.mapper.tracks(records).await?)
    }

    async fn get_albums(&self, offset: usize, limit: usize) -> CoreResult<Vec<CoreAlbum>> {
        let records = self
            .mapper
            .stores()
            .albums
            .get_items(offset, limit)
            .await
            .map_err(LocalFilesError::from)?;
        let mut albums = Vec::with_capacity(records.len());
        for record in records {
            albums.push(self.mapper.album(record).await?);
        }
        Ok(albums)
    }

    async fn get_artists(&self, offset: usize, limit: usize) -> CoreResult<Vec<CoreArtist>> {
        let records = self
            .mapper
            .stores()
            .artists
            .get_items(offset, limit)
            .await
            .map_err(LocalFilesError::from)?;
        Ok(records.into_iter().map(|r| self.mapper.artist(r)).collect())
    }

    async fn get_playlists(&self, offset: usize, limit: usize) -> CoreResult<Vec<CorePlaylist>> {
        let records = self
            .mapper
            .stores()
            .playlists
            .get_items(offset, limit)
            .await
            .map_err(LocalFilesError::from)?;
        Ok(records.into_iter().map(|r| self.mapper.playlist(r)).collect())
    }

    async fn get_child_tracks(
        &self,
        parent_kind: ItemKind,
        parent_id: &str,
        offset: usize,
        limit: usize,
    ) -> CoreResult<Vec<CoreTrack>> {
        Ok(self
            .mapper
            .child_tracks(parent_kind, parent_id, offset, limit)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_fallback() {
        assert_eq!(file_name("/music/Intro Song.mp3"), "Intro Song");
        assert_eq!(file_name("C:\\Music\\mix.m3u"), "mix");
        assert_eq!(file_name(".hidden"), ".hidden");
    }
}
