//! Ingestion Data Types
//!
//! Structures passed between the command layer, the workers and the store
//! while a URL turns into a catalogued song.

use crate::executor::types::JobId;
use crate::storage::types::SongFields;

/// Result of an `ADD` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A download job was queued (and possibly dispatched already).
    Queued(JobId),
    /// The URL is already catalogued, queued or being downloaded.
    Duplicate,
}

/// What a worker learned about a download from the downloader's output.
///
/// Parsed from a METADATA frame; the filename is derived from the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadMetadata {
    pub title: String,
    /// `None` when the downloader reported no usable artist.
    pub artist: Option<String>,
    /// Length in seconds, 0 when unknown.
    pub duration: u32,
    pub url: String,
    pub filename: String,
}

impl DownloadMetadata {
    pub fn into_fields(self) -> SongFields {
        SongFields::new(self.url, self.title, self.artist, self.filename, self.duration)
    }
}

/// Completion notice routed to the client that issued `ADD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Downloaded(String),
    DownloadFailed(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Downloaded(url) => write!(f, "DOWNLOADED {}", url),
            Notice::DownloadFailed(url) => write!(f, "DOWNLOAD_FAILED {}", url),
        }
    }
}
