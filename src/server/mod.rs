//! Server Module
//!
//! The client-facing side of the catalog.
//!
//! ## Submodules
//! - **`transport`**: TCP accept loop and per-connection line framing.
//! - **`reactor`**: The single event loop that owns the `AcquisitionPipeline` and
//!   serializes client commands with worker reports.
//! - **`commands`**: Parsing of `ADD`, `INDEX`, `GET`, `SEARCH` and `EXIT`, and the
//!   text replies they produce.

pub mod commands;
pub mod reactor;
pub mod transport;
