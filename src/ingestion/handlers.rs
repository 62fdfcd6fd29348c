use super::types::DownloadMetadata;
use crate::error::{CatalogError, Result};
use crate::storage::codec::{FILENAME_SLOT, max_len};
use crate::storage::types::SongFields;

use regex::Regex;
use std::sync::OnceLock;

const AUDIO_EXTENSION: &str = ".mp3";
/// Placeholder yt-dlp prints for a missing field.
const NOT_AVAILABLE: &str = "NA";

/// Parses a METADATA payload: `title\nartist\nduration\nurl`.
pub fn parse_metadata(payload: &str) -> Result<DownloadMetadata> {
    let mut lines = payload.lines().map(|line| line.trim_end_matches('\r'));

    let (Some(title), Some(artist), Some(duration), Some(url)) =
        (lines.next(), lines.next(), lines.next(), lines.next())
    else {
        return Err(CatalogError::IncompleteMetadata);
    };

    let title = title.trim();
    let url = url.trim();
    if title.is_empty() || url.is_empty() {
        return Err(CatalogError::IncompleteMetadata);
    }

    let artist = artist.trim();
    let artist = (!artist.is_empty() && artist != NOT_AVAILABLE).then(|| artist.to_string());

    Ok(DownloadMetadata {
        title: title.to_string(),
        artist,
        duration: parse_duration(duration),
        url: url.to_string(),
        filename: synthesize_filename(title),
    })
}

/// Seconds from the downloader's duration field. Decimals are rounded;
/// anything unparseable or negative is 0.
pub fn parse_duration(text: &str) -> u32 {
    let text = text.trim();
    if let Ok(seconds) = text.parse::<u32>() {
        return seconds;
    }
    match text.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => {
            seconds.round().min(u32::MAX as f64) as u32
        }
        _ => 0,
    }
}

/// File name for a downloaded title: every character outside `[A-Za-z0-9_- ]`
/// becomes `_`, then `.mp3` is appended. The stem is cut so the name fits its
/// storage slot.
pub fn synthesize_filename(title: &str) -> String {
    let mut stem = unsafe_filename_chars().replace_all(title, "_").into_owned();
    stem.truncate(max_len(FILENAME_SLOT) - AUDIO_EXTENSION.len());
    stem.push_str(AUDIO_EXTENSION);
    stem
}

fn unsafe_filename_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\- ]").expect("filename pattern is valid"))
}

/// Parses the arguments of `INDEX url|title|artist|filename|duration`.
///
/// Exactly five fields are required and the duration must be a whole number
/// of seconds. An empty artist is recorded as unknown.
pub fn parse_index_fields(args: &str) -> Result<SongFields> {
    let fields: Vec<&str> = args.split('|').map(str::trim).collect();
    let [url, title, artist, filename, duration] = fields.as_slice() else {
        return Err(CatalogError::InvalidFormat);
    };

    if url.is_empty() {
        return Err(CatalogError::InvalidFormat);
    }
    let duration = duration
        .parse::<u32>()
        .map_err(|_| CatalogError::InvalidFormat)?;
    let artist = (!artist.is_empty()).then(|| artist.to_string());

    Ok(SongFields::new(*url, *title, artist, *filename, duration))
}
