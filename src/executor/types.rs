use super::protocol::{WorkerMessage, write_message};
use crate::error::Result;

use std::fmt;
use std::time::Instant;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Unique identifier for a download job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl JobId {
    /// Generates a new random UUID v4-based JobId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Route back to the client that asked for something.
///
/// Replies are pushed as text lines into the connection's outgoing queue. The
/// handle stays valid as long as the connection's writer is alive.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: u64,
    replies: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
    pub fn new(id: u64, replies: mpsc::UnboundedSender<String>) -> Self {
        Self { id, replies }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queues `line` for the client. Returns `false` if the client is gone.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.replies.send(line.into()).is_ok()
    }
}

/// A queued request to acquire the media behind `url`.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: JobId,
    pub url: String,
    pub client: ClientHandle,
    pub submitted_at: Instant,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, client: ClientHandle) -> Self {
        Self {
            id: JobId::new(),
            url: url.into(),
            client,
            submitted_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No job assigned.
    Idle,
    /// Exactly one job assigned, waiting for its completion message.
    Busy,
}

/// The coordinator's view of one worker.
pub struct WorkerSlot {
    pub id: usize,
    pub state: WorkerState,
    pub current_job: Option<DownloadJob>,
    /// Coordinator → worker channel.
    requests: Box<dyn AsyncWrite + Send + Unpin>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerSlot {
    pub fn new(id: usize, requests: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            id,
            state: WorkerState::Idle,
            current_job: None,
            requests: Box::new(requests),
            handle: None,
        }
    }

    /// Attaches the task running this worker's job loop.
    pub fn with_handle(mut self, handle: JoinHandle<()>) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn is_idle(&self) -> bool {
        self.state == WorkerState::Idle
    }

    pub async fn send(&mut self, message: &WorkerMessage) -> Result<()> {
        write_message(&mut self.requests, message).await
    }

    pub(crate) fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }
}

impl fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("current_job", &self.current_job.as_ref().map(|job| &job.url))
            .finish()
    }
}

/// Something a worker reported, tagged with the worker's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Message {
        worker: usize,
        message: WorkerMessage,
    },
    /// The worker's response channel closed or delivered garbage.
    Closed { worker: usize },
}
