//! Tag reading
//!
//! [`TagReader`] turns the bytes of an audio file into [`RawTags`]. The
//! default [`LoftyTagReader`] supports ID3v2, Vorbis comments, MP4 atoms,
//! APE and RIFF INFO tags through `lofty`.

use bytes::Bytes;
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::picture::MimeType;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::io::Cursor;
use std::time::Duration;

use crate::error::{MetadataError, Result};

/// Container-level audio properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioProperties {
    pub duration: Option<Duration>,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPicture {
    pub data: Bytes,
    pub mime_type: Option<String>,
    pub picture_type: String,
}

/// Tag values as stored in the file, before splitting and id assignment.
///
/// Multi-valued fields keep one entry per stored value; a single value may
/// still hold several names joined by a separator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTags {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_artists: Vec<String>,
    pub genres: Vec<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    pub composer: Option<String>,
    pub publisher: Option<String>,
    pub comment: Option<String>,
    pub pictures: Vec<RawPicture>,
    pub properties: AudioProperties,
    pub mime_type: Option<String>,
}

impl RawTags {
    /// True when no tag field at all was present.
    pub fn is_untagged(&self) -> bool {
        self.title.is_none()
            && self.artists.is_empty()
            && self.album.is_none()
            && self.album_artists.is_empty()
            && self.genres.is_empty()
            && self.track_number.is_none()
    }
}

/// Parses tags out of file contents.
///
/// Called from a blocking worker thread, once per file.
pub trait TagReader: Send + Sync {
    /// `name` is the file name, used as a format hint.
    fn read(&self, name: &str, data: &[u8]) -> Result<RawTags>;
}

/// [`TagReader`] backed by `lofty`.
#[derive(Debug, Clone)]
pub struct LoftyTagReader {
    parse_options: ParseOptions,
}

impl LoftyTagReader {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    fn strings(tag: &Tag, key: &ItemKey) -> Vec<String> {
        tag.get_strings(key).map(str::to_string).collect()
    }

    fn read_tag(tag: &Tag, raw: &mut RawTags) {
        raw.title = tag.title().map(|s| s.to_string());
        raw.artists = Self::strings(tag, &ItemKey::TrackArtist);
        raw.album = tag.album().map(|s| s.to_string());
        raw.album_artists = Self::strings(tag, &ItemKey::AlbumArtist);
        raw.genres = Self::strings(tag, &ItemKey::Genre);
        raw.year = tag.year();
        raw.track_number = tag.track();
        raw.disc_number = tag.disk();
        raw.disc_total = tag.disk_total();
        raw.composer = tag.get_string(&ItemKey::Composer).map(str::to_string);
        raw.publisher = tag.get_string(&ItemKey::Label).map(str::to_string);
        raw.comment = tag.comment().map(|s| s.to_string());
        raw.pictures = tag
            .pictures()
            .iter()
            .filter(|pic| !pic.data().is_empty())
            .map(|pic| RawPicture {
                data: Bytes::copy_from_slice(pic.data()),
                mime_type: pic.mime_type().and_then(mime_type_to_str).map(str::to_string),
                picture_type: format!("{:?}", pic.pic_type()),
            })
            .collect();
    }
}

impl Default for LoftyTagReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TagReader for LoftyTagReader {
    fn read(&self, name: &str, data: &[u8]) -> Result<RawTags> {
        let tagged_file = Probe::new(Cursor::new(data))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::Parse(format!("{}: {}", name, e)))?
            .read()
            .map_err(|e| match e.kind() {
                lofty::error::ErrorKind::UnknownFormat => {
                    MetadataError::UnsupportedFormat(name.to_string())
                }
                _ => MetadataError::Parse(format!("{}: {}", name, e)),
            })?;

        let properties = tagged_file.properties();
        let duration = properties.duration();

        let mut raw = RawTags {
            properties: AudioProperties {
                duration: (!duration.is_zero()).then_some(duration),
                bitrate: properties.audio_bitrate(),
                sample_rate: properties.sample_rate(),
                channels: properties.channels(),
            },
            mime_type: file_type_to_mime_type(tagged_file.file_type()).map(str::to_string),
            ..Default::default()
        };

        if let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        {
            Self::read_tag(tag, &mut raw);
        }

        Ok(raw)
    }
}

fn mime_type_to_str(mime_type: &MimeType) -> Option<&'static str> {
    match mime_type {
        MimeType::Png => Some("image/png"),
        MimeType::Jpeg => Some("image/jpeg"),
        MimeType::Tiff => Some("image/tiff"),
        MimeType::Bmp => Some("image/bmp"),
        MimeType::Gif => Some("image/gif"),
        _ => None,
    }
}

fn file_type_to_mime_type(file_type: FileType) -> Option<&'static str> {
    match file_type {
        FileType::Aac => Some("audio/aac"),
        FileType::Aiff => Some("audio/aiff"),
        FileType::Ape => Some("audio/ape"),
        FileType::Flac => Some("audio/flac"),
        FileType::Mpeg => Some("audio/mpeg"),
        FileType::Mp4 => Some("audio/mp4"),
        FileType::Mpc => Some("audio/musepack"),
        FileType::Opus => Some("audio/opus"),
        FileType::Vorbis => Some("audio/vorbis"),
        FileType::Speex => Some("audio/speex"),
        FileType::Wav => Some("audio/wav"),
        FileType::WavPack => Some("audio/wavpack"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_rejected() {
        let reader = LoftyTagReader::new();
        let result = reader.read("noise.bin", b"This is not a valid audio file");
        assert!(matches!(
            result,
            Err(MetadataError::Parse(_)) | Err(MetadataError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_untagged_detection() {
        let mut raw = RawTags::default();
        assert!(raw.is_untagged());
        raw.album = Some("Album".to_string());
        assert!(!raw.is_untagged());
    }

    #[test]
    fn test_mime_mapping() {
        assert_eq!(file_type_to_mime_type(FileType::Flac), Some("audio/flac"));
        assert_eq!(mime_type_to_str(&MimeType::Jpeg), Some("image/jpeg"));
    }
}
