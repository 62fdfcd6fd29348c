//! Download Executor Module
//!
//! Runs long, blocking media acquisitions away from the request loop.
//!
//! ## Architecture Overview
//! 1. **Submission**: `ADD` turns into a `DownloadJob` pushed onto a FIFO queue.
//! 2. **Assignment**: The first idle worker receives a REQUEST frame and becomes busy.
//! 3. **Execution**: The worker runs the external downloader as a child process and
//!    streams METADATA, then FINISHED or FAILED, back over its response channel.
//! 4. **Completion**: The coordinator marks the worker idle, notifies the client and
//!    drains the queue again.
//!
//! Workers never touch the catalog. Everything they learn travels as frames, so a
//! stuck download can only ever occupy its own worker.
//!
//! ## Submodules
//! - **`protocol`**: Length-prefixed frame codec shared by coordinator and workers.
//! - **`worker`**: The worker job loop and the downloader invocation.
//! - **`pool`**: `JobScheduler`, the queue and worker slots owned by the coordinator.
//! - **`types`**: Jobs, worker slots, client handles and worker events.

pub mod pool;
pub mod protocol;
pub mod types;
pub mod worker;

#[cfg(test)]
mod tests;
