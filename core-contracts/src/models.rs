//! Items produced by a core.
//!
//! Every item carries a [`SourceRef`] naming the core instance that produced
//! it. Item ids are only unique within that instance; [`ItemKey`] combines
//! both into an identity that is safe to compare across cores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use core_runtime::events::ItemKind;

/// Back reference from an item to the core that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source type id (`"local-files"`, `"onedrive"`, ...)
    pub core_id: String,
    /// Instance id, distinct for two accounts of the same source type
    pub instance_id: String,
}

impl SourceRef {
    pub fn new(core_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            core_id: core_id.into(),
            instance_id: instance_id.into(),
        }
    }
}

/// Identity of an item across all cores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub instance_id: String,
    pub id: String,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.instance_id, self.id)
    }
}

/// Behaviour shared by every item type.
pub trait CoreItem: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: ItemKind;

    fn id(&self) -> &str;
    fn source(&self) -> &SourceRef;
    /// Display name (title for tracks, URI for images)
    fn name(&self) -> &str;

    fn key(&self) -> ItemKey {
        ItemKey {
            instance_id: self.source().instance_id.clone(),
            id: self.id().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreImage {
    pub id: String,
    pub source: SourceRef,
    pub uri: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl CoreImage {
    pub fn new(source: SourceRef, id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            uri: uri.into(),
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreTrack {
    pub id: String,
    pub source: SourceRef,
    pub name: String,
    pub description: Option<String>,
    pub duration: Option<Duration>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub artist_ids: Vec<String>,
    pub artist_names: Vec<String>,
    pub genres: Vec<String>,
    pub year: Option<u32>,
    pub images: Vec<CoreImage>,
}

impl CoreTrack {
    pub fn new(source: SourceRef, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            name: name.into(),
            description: None,
            duration: None,
            track_number: None,
            disc_number: None,
            album_id: None,
            album_name: None,
            artist_ids: Vec::new(),
            artist_names: Vec::new(),
            genres: Vec::new(),
            year: None,
            images: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_artist(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.artist_ids.push(id.into());
        self.artist_names.push(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreAlbum {
    pub id: String,
    pub source: SourceRef,
    pub name: String,
    pub description: Option<String>,
    pub year: Option<u32>,
    pub artist_names: Vec<String>,
    pub genres: Vec<String>,
    pub images: Vec<CoreImage>,
    pub total_tracks: usize,
}

impl CoreAlbum {
    pub fn new(source: SourceRef, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            name: name.into(),
            description: None,
            year: None,
            artist_names: Vec::new(),
            genres: Vec::new(),
            images: Vec::new(),
            total_tracks: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreArtist {
    pub id: String,
    pub source: SourceRef,
    pub name: String,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub images: Vec<CoreImage>,
    pub total_tracks: usize,
    pub total_albums: usize,
}

impl CoreArtist {
    pub fn new(source: SourceRef, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            name: name.into(),
            description: None,
            genres: Vec::new(),
            images: Vec::new(),
            total_tracks: 0,
            total_albums: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorePlaylist {
    pub id: String,
    pub source: SourceRef,
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<CoreImage>,
    pub total_tracks: usize,
}

impl CorePlaylist {
    pub fn new(source: SourceRef, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            name: name.into(),
            description: None,
            images: Vec::new(),
            total_tracks: 0,
        }
    }
}

macro_rules! impl_core_item {
    ($ty:ty, $kind:expr, $name:ident) => {
        impl CoreItem for $ty {
            const KIND: ItemKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn source(&self) -> &SourceRef {
                &self.source
            }

            fn name(&self) -> &str {
                &self.$name
            }
        }
    };
}

impl_core_item!(CoreTrack, ItemKind::Track, name);
impl_core_item!(CoreAlbum, ItemKind::Album, name);
impl_core_item!(CoreArtist, ItemKind::Artist, name);
impl_core_item!(CorePlaylist, ItemKind::Playlist, name);
impl_core_item!(CoreImage, ItemKind::Image, uri);

/// A playback device a core can route audio to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// A playable stream descriptor. The playback engine that consumes it is
/// outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub track: ItemKey,
    pub uri: String,
    pub mime_type: Option<String>,
}

/// Results of a single core's search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub tracks: Vec<CoreTrack>,
    pub albums: Vec<CoreAlbum>,
    pub artists: Vec<CoreArtist>,
    pub playlists: Vec<CorePlaylist>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
            && self.albums.is_empty()
            && self.artists.is_empty()
            && self.playlists.is_empty()
    }
}
