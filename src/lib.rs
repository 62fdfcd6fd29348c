//! Song Catalog Server Library
//!
//! This library crate defines the core modules of the catalog server.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`search`**: Tokenizer plus the exact, prefix and fuzzy word indices, and the
//!   `SearchIndex` that unions their answers.
//! - **`storage`**: The append-only `SongStore` and its fixed-width binary file format.
//! - **`executor`**: The download worker pool, its framed channel protocol and the job
//!   loop that drives the external downloader.
//! - **`ingestion`**: The `AcquisitionPipeline` linking duplicate checks, downloads,
//!   metadata parsing, indexing and persistence.
//! - **`server`**: TCP transport, the single event loop and the text command protocol.
//! - **`config`** and **`error`**: Configuration loading and the crate's error type.

pub mod config;
pub mod error;
pub mod executor;
pub mod ingestion;
pub mod search;
pub mod server;
pub mod storage;
