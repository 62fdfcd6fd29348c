//! Storage Module
//!
//! Owns the song catalog and its on-disk representation.
//!
//! ## Core Concepts
//! - **Append-only**: Songs are added, never modified or removed.
//! - **Fixed-width records**: The file is a header followed by one fixed-size record per
//!   song, so a song's byte offset follows from its position alone.
//! - **Rebuild on load**: Word indices are never persisted; they are reconstructed from
//!   the stored titles and artists.

pub mod codec;
pub mod store;
pub mod types;
