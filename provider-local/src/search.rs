//! Substring search over the scanned library.

use async_trait::async_trait;
use core_contracts::{CancellationToken, CoreError, Result as CoreResult, SearchCapability, SearchResults};
use core_library::models::normalize_name;
use core_library::MetadataRepository;
use std::collections::HashSet;

use crate::error::LocalFilesError;
use crate::library::RecordMapper;

/// Results returned per item kind.
pub const MAX_RESULTS_PER_KIND: usize = 50;

pub const MAX_SUGGESTIONS: usize = 10;

/// Case-insensitive search of titles and names.
pub struct LocalSearch {
    mapper: RecordMapper,
}

impl LocalSearch {
    pub(crate) fn new(mapper: RecordMapper) -> Self {
        Self { mapper }
    }
}

fn matches(name: Option<&str>, query: &str) -> bool {
    name.map(|n| normalize_name(n).contains(query)).unwrap_or(false)
}

fn checkpoint(cancel: &CancellationToken) -> CoreResult<()> {
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    Ok(())
}

#[async_trait]
impl SearchCapability for LocalSearch {
    async fn search(&self, query: &str, cancel: &CancellationToken) -> CoreResult<SearchResults> {
        checkpoint(cancel)?;
        let query = normalize_name(query);
        if query.is_empty() {
            return Ok(SearchResults::default());
        }
        let stores = self.mapper.stores();

        let tracks: Vec<_> = stores
            .tracks
            .all()
            .await
            .map_err(LocalFilesError::from)?
            .into_iter()
            .filter(|t| matches(t.title.as_deref(), &query))
            .take(MAX_RESULTS_PER_KIND)
            .collect();
        let tracks = self.mapper.tracks(tracks).await?;
        checkpoint(cancel)?;

        let mut albums = Vec::new();
        for record in stores.albums.all().await.map_err(LocalFilesError::from)? {
            if albums.len() == MAX_RESULTS_PER_KIND {
                break;
            }
            if matches(record.title.as_deref(), &query) {
                albums.push(self.mapper.album(record).await?);
            }
        }
        checkpoint(cancel)?;

        let artists = stores
            .artists
            .all()
            .await
            .map_err(LocalFilesError::from)?
            .into_iter()
            .filter(|a| matches(a.name.as_deref(), &query))
            .take(MAX_RESULTS_PER_KIND)
            .map(|a| self.mapper.artist(a))
            .collect();

        let playlists = stores
            .playlists
            .all()
            .await
            .map_err(LocalFilesError::from)?
            .into_iter()
            .filter(|p| matches(p.title.as_deref(), &query))
            .take(MAX_RESULTS_PER_KIND)
            .map(|p| self.mapper.playlist(p))
            .collect();

        Ok(SearchResults {
            tracks,
            albums,
            artists,
            playlists,
        })
    }

    /// Names starting with `query`: artists first, then albums, then tracks.
    async fn suggestions(&self, query: &str) -> CoreResult<Vec<String>> {
        let query = normalize_name(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let stores = self.mapper.stores();

        let artists = stores.artists.all().await.map_err(LocalFilesError::from)?;
        let albums = stores.albums.all().await.map_err(LocalFilesError::from)?;
        let tracks = stores.tracks.all().await.map_err(LocalFilesError::from)?;

        let names = artists
            .into_iter()
            .filter_map(|a| a.name)
            .chain(albums.into_iter().filter_map(|a| a.title))
            .chain(tracks.into_iter().filter_map(|t| t.title));

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for name in names {
            let normalized = normalize_name(&name);
            if normalized.starts_with(&query) && seen.insert(normalized) {
                suggestions.push(name);
                if suggestions.len() == MAX_SUGGESTIONS {
                    break;
                }
            }
        }
        Ok(suggestions)
    }
}
