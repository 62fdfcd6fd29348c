//! Song Data Types
//!
//! `Song` is the immutable catalog record; `SongFields` is what callers
//! submit before an id has been assigned.

/// Artist recorded when none is supplied.
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// One catalog entry.
///
/// Text fields are bounded by the width of their on-disk slot (see
/// `storage::codec`); `url` is unique across the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: u32,
    pub title: String,
    pub artist: String,
    pub filename: String,
    pub url: String,
    /// Length in seconds.
    pub duration: u32,
}

/// Fields of a song about to be added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongFields {
    pub title: String,
    pub artist: Option<String>,
    pub filename: String,
    pub url: String,
    pub duration: u32,
}

impl SongFields {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        artist: Option<String>,
        filename: impl Into<String>,
        duration: u32,
    ) -> Self {
        Self {
            title: title.into(),
            artist,
            filename: filename.into(),
            url: url.into(),
            duration,
        }
    }

    /// The artist to store: the supplied one, or `Unknown` when absent or blank.
    pub fn artist_or_default(&self) -> String {
        match self.artist.as_deref().map(str::trim) {
            Some(artist) if !artist.is_empty() => artist.to_string(),
            _ => UNKNOWN_ARTIST.to_string(),
        }
    }
}
