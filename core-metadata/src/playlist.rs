//! Playlist file parsing (M3U, M3U8, PLS).
//!
//! Entries are resolved against the playlist's own directory and mapped to
//! track ids with the same function the scanner uses for audio files, so a
//! playlist entry and the scanned file it points at share an id.

use core_library::models::{playlist_id_for_path, track_id_for_path, PlaylistMetadata};

use crate::artists::normalize_text;
use crate::error::{MetadataError, Result};

pub const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8", "pls"];

pub fn is_playlist_extension(extension: &str) -> bool {
    PLAYLIST_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaylistFormat {
    M3u,
    Pls,
}

/// Parse the playlist stored at `file_id` (full path for local files).
pub fn parse_playlist(file_id: &str, text: &str) -> Result<PlaylistMetadata> {
    let (directory, file_name) = split_path(file_id);
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let format = match extension.as_str() {
        "m3u" | "m3u8" => PlaylistFormat::M3u,
        "pls" => PlaylistFormat::Pls,
        other => {
            return Err(MetadataError::UnsupportedFormat(format!(
                "playlist extension '{}'",
                other
            )))
        }
    };

    // Strip a UTF-8 BOM left by some editors.
    let text = text.trim_start_matches('\u{feff}');
    let (title, entries) = match format {
        PlaylistFormat::M3u => parse_m3u(text),
        PlaylistFormat::Pls => parse_pls(text)?,
    };

    let title = title.or_else(|| {
        let stem = file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name);
        Some(normalize_text(stem)).filter(|s| !s.is_empty())
    });

    let track_ids = entries
        .iter()
        .map(|entry| track_id_for_path(&resolve_entry(directory, entry)))
        .collect();

    Ok(PlaylistMetadata {
        id: playlist_id_for_path(file_id),
        title,
        description: None,
        track_ids,
        source_file: Some(file_id.to_string()),
    })
}

fn parse_m3u(text: &str) -> (Option<String>, Vec<String>) {
    let mut title = None;
    let mut entries = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix("#PLAYLIST:") {
            title = Some(normalize_text(name)).filter(|s| !s.is_empty());
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        entries.push(line.to_string());
    }

    (title, entries)
}

fn parse_pls(text: &str) -> Result<(Option<String>, Vec<String>)> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    match lines.next() {
        Some(header) if header.eq_ignore_ascii_case("[playlist]") => {}
        _ => {
            return Err(MetadataError::InvalidPlaylist(
                "missing [playlist] header".to_string(),
            ))
        }
    }

    let mut numbered: Vec<(u32, String)> = Vec::new();
    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.len() > 4 && key[..4].eq_ignore_ascii_case("file") {
            if let Ok(index) = key[4..].parse::<u32>() {
                numbered.push((index, value.trim().to_string()));
            }
        }
    }

    // Entries are numbered; file order is not guaranteed.
    numbered.sort_by_key(|(index, _)| *index);
    Ok((None, numbered.into_iter().map(|(_, path)| path).collect()))
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\']) {
        Some(index) => (&path[..index], &path[index + 1..]),
        None => ("", path),
    }
}

fn is_absolute(entry: &str) -> bool {
    let bytes = entry.as_bytes();
    entry.starts_with('/')
        || entry.starts_with('\\')
        || entry.contains("://")
        || (bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Join `entry` onto `directory` and fold `.` and `..` segments.
fn resolve_entry(directory: &str, entry: &str) -> String {
    let entry = entry.strip_prefix("file://").unwrap_or(entry);
    if entry.contains("://") {
        return entry.to_string();
    }

    let joined = if is_absolute(entry) || directory.is_empty() {
        entry.replace('\\', "/")
    } else {
        format!("{}/{}", directory, entry).replace('\\', "/")
    };

    let rooted = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let folded = segments.join("/");
    if rooted {
        format!("/{}", folded)
    } else {
        folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_m3u_relative_entries_match_track_ids() {
        let text = "#EXTM3U\n#PLAYLIST:Road Trip\n#EXTINF:180,A - Song\nsong.mp3\n\nsub/other.flac\n";
        let playlist = parse_playlist("/music/mix.m3u", text).unwrap();

        assert_eq!(playlist.title.as_deref(), Some("Road Trip"));
        assert_eq!(
            playlist.track_ids,
            vec![
                track_id_for_path("/music/song.mp3"),
                track_id_for_path("/music/sub/other.flac"),
            ]
        );
        assert_eq!(playlist.id, playlist_id_for_path("/music/mix.m3u"));
        assert_eq!(playlist.source_file.as_deref(), Some("/music/mix.m3u"));
    }

    #[test]
    fn test_parent_and_windows_entries() {
        let text = "..\\shared\\song.mp3\nC:\\Music\\abs.mp3\nfile:///music/x.mp3\n";
        let playlist = parse_playlist("/music/lists/win.m3u8", text).unwrap();

        assert_eq!(
            playlist.track_ids,
            vec![
                track_id_for_path("/music/shared/song.mp3"),
                track_id_for_path("C:/Music/abs.mp3"),
                track_id_for_path("/music/x.mp3"),
            ]
        );
        assert_eq!(playlist.title.as_deref(), Some("win"));
    }

    #[test]
    fn test_pls_orders_by_entry_number() {
        let text = "[playlist]\nFile2=b.mp3\nTitle2=B\nFile1=a.mp3\nNumberOfEntries=2\nVersion=2\n";
        let playlist = parse_playlist("/music/list.pls", text).unwrap();

        assert_eq!(
            playlist.track_ids,
            vec![
                track_id_for_path("/music/a.mp3"),
                track_id_for_path("/music/b.mp3"),
            ]
        );
    }

    #[test]
    fn test_pls_without_header_is_rejected() {
        let result = parse_playlist("/music/list.pls", "File1=a.mp3\n");
        assert!(matches!(result, Err(MetadataError::InvalidPlaylist(_))));
    }

    #[test]
    fn test_unknown_extension() {
        let result = parse_playlist("/music/list.txt", "a.mp3");
        assert!(matches!(result, Err(MetadataError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_empty_m3u() {
        let playlist = parse_playlist("/music/empty.m3u", "\u{feff}#EXTM3U\n").unwrap();
        assert!(playlist.track_ids.is_empty());
    }

    #[test]
    fn test_remote_entries_kept_verbatim() {
        assert_eq!(
            resolve_entry("/music", "http://radio.example/stream"),
            "http://radio.example/stream"
        );
    }
}
