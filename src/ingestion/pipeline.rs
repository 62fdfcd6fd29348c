//! Acquisition Pipeline
//!
//! Glue between the catalog and the worker pool: duplicate check, job
//! submission, metadata ingestion, indexing and persistence. Everything here
//! runs on the coordinator's single event loop, so the store and the
//! scheduler are owned outright and never locked.

use super::handlers::parse_metadata;
use super::types::{AddOutcome, Notice};
use crate::error::{CatalogError, Result};
use crate::executor::pool::JobScheduler;
use crate::executor::protocol::WorkerMessage;
use crate::executor::types::{ClientHandle, DownloadJob, WorkerEvent};
use crate::storage::store::SongStore;
use crate::storage::types::{Song, SongFields};

use std::path::{Path, PathBuf};

pub struct AcquisitionPipeline {
    store: SongStore,
    scheduler: JobScheduler,
    db_path: PathBuf,
}

impl AcquisitionPipeline {
    pub fn new(store: SongStore, scheduler: JobScheduler, db_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            scheduler,
            db_path: db_path.into(),
        }
    }

    /// Queues a download for `url` unless it is catalogued or already pending.
    pub async fn add(&mut self, url: &str, client: ClientHandle) -> AddOutcome {
        if self.store.is_duplicate_url(url) || self.scheduler.is_pending(url) {
            tracing::info!("Client {}: duplicate URL rejected: {}", client.id(), url);
            return AddOutcome::Duplicate;
        }

        let job = self.scheduler.submit_download(url, client).await;
        AddOutcome::Queued(job)
    }

    /// Stores and indexes a song with caller-supplied fields, then persists.
    pub fn index(&mut self, fields: SongFields) -> Result<u32> {
        let id = self.store.add_song(fields)?;
        self.persist();
        Ok(id)
    }

    /// The song with `id` and the byte offset of its record on disk.
    pub fn get(&self, id: u32) -> Option<(&Song, u64)> {
        let song = self.store.get_by_id(id)?;
        let offset = self.store.get_offset(id)?;
        Some((song, offset))
    }

    pub fn search(&self, query: &str) -> Vec<&Song> {
        self.store.search(query)
    }

    /// Applies one report from the worker pool.
    pub async fn on_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Message { worker, message } => match message {
                WorkerMessage::Metadata { payload } => self.ingest_metadata(worker, &payload),
                WorkerMessage::Finished { url } => {
                    self.finish_job(worker, &url, Notice::Downloaded).await;
                }
                WorkerMessage::Failed { url, status } => {
                    tracing::warn!("Worker {}: download of {} failed ({})", worker, url, status);
                    self.finish_job(worker, &url, Notice::DownloadFailed).await;
                }
                other => {
                    tracing::warn!("Worker {} sent unexpected {:?}", worker, other);
                }
            },
            WorkerEvent::Closed { worker } => match self.scheduler.mark_lost(worker) {
                Some(job) => {
                    tracing::error!(
                        "Worker {} died while downloading {}; worker taken out of rotation",
                        worker,
                        job.url
                    );
                    notify(&job, Notice::DownloadFailed(job.url.clone()));
                }
                None => tracing::warn!("Worker {} is gone", worker),
            },
        }
    }

    /// Stops the workers and writes the catalog one last time.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await;
        self.store.save(&self.db_path)?;
        tracing::info!(
            "Catalog saved to {} ({} song(s))",
            self.db_path.display(),
            self.store.len()
        );
        Ok(())
    }

    pub fn store(&self) -> &SongStore {
        &self.store
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn ingest_metadata(&mut self, worker: usize, payload: &str) {
        let metadata = match parse_metadata(payload) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Worker {}: unusable metadata {:?}: {}", worker, payload, e);
                return;
            }
        };

        let url = metadata.url.clone();
        match self.index(metadata.into_fields()) {
            Ok(id) => tracing::info!("Worker {}: {} catalogued as song {}", worker, url, id),
            Err(CatalogError::DuplicateUrl) => {
                tracing::info!("Worker {}: {} was already catalogued", worker, url);
            }
            Err(e) => tracing::warn!("Worker {}: could not catalogue {}: {}", worker, url, e),
        }
    }

    async fn finish_job(&mut self, worker: usize, url: &str, notice: fn(String) -> Notice) {
        match self.scheduler.complete(worker) {
            Some(job) => {
                if job.url != url {
                    tracing::warn!(
                        "Worker {} reported {} but was assigned {}",
                        worker,
                        url,
                        job.url
                    );
                }
                tracing::info!(
                    "Worker {} done with {} after {:.1?} since submission",
                    worker,
                    job.url,
                    job.submitted_at.elapsed()
                );
                notify(&job, notice(job.url.clone()));
            }
            None => tracing::warn!("Worker {} reported {} without an assigned job", worker, url),
        }

        self.scheduler.assign_pending_downloads().await;
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.db_path) {
            tracing::error!("Failed to save catalog to {}: {}", self.db_path.display(), e);
        }
    }
}

fn notify(job: &DownloadJob, notice: Notice) {
    if !job.client.send(notice.to_string()) {
        tracing::debug!("Client {} left before {}", job.client.id(), notice);
    }
}
