//! Ingestion Module
//!
//! Turns submitted URLs into catalogued songs.
//!
//! ## Workflow
//! 1. **Check**: `ADD` is rejected as a duplicate if the URL is already stored, queued or
//!    being downloaded.
//! 2. **Submit**: Otherwise a download job goes to the `JobScheduler`.
//! 3. **Ingest**: When a worker reports METADATA, the fields are parsed, a filename is
//!    derived from the title, and the song is stored and indexed.
//! 4. **Persist**: The catalog file is rewritten after every indexed song.
//!
//! `INDEX` skips the download and feeds caller-supplied fields straight into step 3.

pub mod handlers;
pub mod pipeline;
pub mod types;

#[cfg(test)]
mod tests;
