//! Job Scheduler
//!
//! Fixed-size pool of workers fed from a FIFO queue of download jobs.
//!
//! ## Assignment
//! Jobs are dispatched in submission order to the first idle worker found by a
//! linear scan. When every worker is busy the queue simply grows; the next
//! completion drains it. A failed dispatch puts the job back at the front and
//! ends the round.
//!
//! ## Responses
//! Each worker's response channel is read by a small forwarding task that turns
//! frames into [`WorkerEvent`]s on one shared mpsc channel. The owner of the
//! scheduler consumes those events and calls [`JobScheduler::complete`] or
//! [`JobScheduler::mark_lost`].

use super::protocol::{WorkerMessage, read_message};
use super::types::{ClientHandle, DownloadJob, JobId, WorkerEvent, WorkerSlot, WorkerState};
use super::worker::{Downloader, worker_loop};

use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncRead, DuplexStream};
use tokio::sync::mpsc;

/// Buffer size of each in-process worker channel.
const CHANNEL_CAPACITY: usize = 64 * 1024;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct JobScheduler {
    workers: Vec<WorkerSlot>,
    queue: VecDeque<DownloadJob>,
}

impl JobScheduler {
    /// Creates a scheduler over already-connected worker slots.
    pub fn new(workers: Vec<WorkerSlot>) -> Self {
        Self {
            workers,
            queue: VecDeque::new(),
        }
    }

    /// Starts `count` workers running `downloader`, each on its own task with a
    /// dedicated pair of channels. Worker reports are delivered to `events`.
    pub fn spawn(
        count: usize,
        downloader: Downloader,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        let workers = (0..count)
            .map(|id| {
                let (request_tx, request_rx) = tokio::io::duplex(CHANNEL_CAPACITY);
                let (response_tx, response_rx) = tokio::io::duplex(CHANNEL_CAPACITY);

                let handle = tokio::spawn(worker_loop(id, request_rx, response_tx, downloader.clone()));
                forward_events(id, response_rx, events.clone());

                WorkerSlot::new(id, request_tx).with_handle(handle)
            })
            .collect();

        tracing::info!("Started {} download worker(s)", count);
        Self::new(workers)
    }

    /// Queues a job for `url` and immediately tries to dispatch it.
    pub async fn submit_download(&mut self, url: impl Into<String>, client: ClientHandle) -> JobId {
        let job = DownloadJob::new(url, client);
        let id = job.id.clone();
        tracing::info!("Queued job {} for {}", id, job.url);

        self.queue.push_back(job);
        self.assign_pending_downloads().await;
        id
    }

    /// Dispatches queued jobs to idle workers. Returns how many were sent.
    pub async fn assign_pending_downloads(&mut self) -> usize {
        let mut dispatched = 0;

        while let Some(job) = self.queue.pop_front() {
            let Some(slot) = self.workers.iter_mut().find(|slot| slot.is_idle()) else {
                self.queue.push_front(job);
                tracing::debug!("No idle worker, {} job(s) waiting", self.queue.len());
                break;
            };

            let request = WorkerMessage::Request {
                url: job.url.clone(),
            };
            match slot.send(&request).await {
                Ok(()) => {
                    tracing::info!("Dispatched job {} ({}) to worker {}", job.id, job.url, slot.id);
                    slot.state = WorkerState::Busy;
                    slot.current_job = Some(job);
                    dispatched += 1;
                }
                Err(e) => {
                    tracing::error!("Could not dispatch {} to worker {}: {}", job.url, slot.id, e);
                    self.queue.push_front(job);
                    break;
                }
            }
        }

        dispatched
    }

    /// Marks `worker` idle after it reported completion and hands back the job
    /// it was running.
    pub fn complete(&mut self, worker: usize) -> Option<DownloadJob> {
        let slot = self.workers.get_mut(worker)?;
        if slot.state == WorkerState::Idle {
            tracing::warn!("Worker {} reported completion while idle", worker);
        }
        slot.state = WorkerState::Idle;
        slot.current_job.take()
    }

    /// Takes `worker` out of rotation after its channel broke. The slot stays
    /// busy without a job so assignment never picks it again.
    pub fn mark_lost(&mut self, worker: usize) -> Option<DownloadJob> {
        let slot = self.workers.get_mut(worker)?;
        slot.state = WorkerState::Busy;
        slot.current_job.take()
    }

    /// Whether a job for `url` is queued or in flight.
    pub fn is_pending(&self, url: &str) -> bool {
        self.queue.iter().any(|job| job.url == url)
            || self
                .workers
                .iter()
                .filter_map(|slot| slot.current_job.as_ref())
                .any(|job| job.url == url)
    }

    pub fn current_job(&self, worker: usize) -> Option<&DownloadJob> {
        self.workers.get(worker)?.current_job.as_ref()
    }

    pub fn worker_state(&self, worker: usize) -> Option<WorkerState> {
        self.workers.get(worker).map(|slot| slot.state)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn idle_count(&self) -> usize {
        self.workers.iter().filter(|slot| slot.is_idle()).count()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Sends SHUTDOWN to every worker. Idle workers get a short grace period
    /// to leave their loop; workers still downloading are aborted, which kills
    /// their downloader process.
    pub async fn shutdown(&mut self) {
        tracing::info!(
            "Shutting down {} worker(s), {} queued job(s) dropped",
            self.workers.len(),
            self.queue.len()
        );
        self.queue.clear();

        for slot in &mut self.workers {
            if let Err(e) = slot.send(&WorkerMessage::Shutdown).await {
                tracing::debug!("Worker {} did not take SHUTDOWN: {}", slot.id, e);
            }
        }

        for slot in &mut self.workers {
            let Some(handle) = slot.take_handle() else {
                continue;
            };
            if slot.current_job.is_some() {
                tracing::warn!("Aborting worker {} mid-download", slot.id);
                handle.abort();
            } else if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                tracing::warn!("Worker {} did not stop in time", slot.id);
            }
        }
    }
}

/// Reads frames from one worker's response channel until it closes.
fn forward_events(worker: usize, mut responses: DuplexStream, events: mpsc::UnboundedSender<WorkerEvent>) {
    tokio::spawn(async move {
        forward(worker, &mut responses, &events).await;
    });
}

async fn forward<R>(worker: usize, responses: &mut R, events: &mpsc::UnboundedSender<WorkerEvent>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_message(responses).await {
            Ok(message) => {
                tracing::debug!("Worker {} reported {:?}", worker, message);
                if events.send(WorkerEvent::Message { worker, message }).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Worker {} response channel ended: {}", worker, e);
                let _ = events.send(WorkerEvent::Closed { worker });
                return;
            }
        }
    }
}
