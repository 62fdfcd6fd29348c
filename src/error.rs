//! Catalog error type.
//!
//! Library operations return [`CatalogError`]. Variants that can be reported
//! to a client carry a stable wire reason, see [`CatalogError::reason`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("song title is required")]
    MissingTitle,

    #[error("song filename is required")]
    MissingFilename,

    #[error("url is already in the catalog")]
    DuplicateUrl,

    /// A text field exceeds the width of its on-disk slot.
    #[error("field '{field}' is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("malformed command arguments")]
    InvalidFormat,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt database: {0}")]
    CorruptDatabase(String),

    #[error("unsupported database version {0}")]
    UnsupportedVersion(u32),

    #[error("could not grow song storage")]
    CapacityExhausted,

    /// Peer closed a worker channel, or a read ended mid-frame.
    #[error("worker channel closed")]
    ChannelClosed,

    #[error("frame payload of {len} bytes exceeds {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("unknown worker message type {0}")]
    UnknownMessageType(u8),

    #[error("incomplete metadata from downloader")]
    IncompleteMetadata,
}

impl CatalogError {
    /// Reason token used in `ERROR <reason>` replies.
    pub fn reason(&self) -> &'static str {
        match self {
            CatalogError::MissingTitle => "missing_title",
            CatalogError::MissingFilename => "missing_filename",
            CatalogError::DuplicateUrl => "duplicate_url",
            CatalogError::FieldTooLong { .. } => "field_too_long",
            CatalogError::InvalidFormat => "invalid_format",
            _ => "internal",
        }
    }
}
