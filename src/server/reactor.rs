//! Event Loop
//!
//! The single task that owns the catalog and the worker pool. Client commands
//! and worker reports arrive on two channels and are handled one at a time,
//! so no state is ever shared or locked.

use super::commands::{Command, Dispatch, dispatch};
use crate::executor::types::{ClientHandle, WorkerEvent};
use crate::ingestion::pipeline::AcquisitionPipeline;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum ServerEvent {
    /// A line received from a client.
    Command { client: ClientHandle, line: String },
    /// Stop the server (signal received).
    Shutdown,
}

pub struct Reactor {
    pipeline: AcquisitionPipeline,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl Reactor {
    pub fn new(
        pipeline: AcquisitionPipeline,
        events: mpsc::UnboundedReceiver<ServerEvent>,
        worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) -> Self {
        Self {
            pipeline,
            events,
            worker_events,
        }
    }

    /// Runs until EXIT, a shutdown signal, or every event source is gone, then
    /// stops the workers and saves the catalog.
    pub async fn run(mut self) -> Result<AcquisitionPipeline> {
        tracing::info!("Event loop started");

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => match event {
                    ServerEvent::Command { client, line } => {
                        if self.handle_line(&client, &line).await {
                            break;
                        }
                    }
                    ServerEvent::Shutdown => {
                        tracing::info!("Shutdown requested");
                        break;
                    }
                },
                Some(event) = self.worker_events.recv() => {
                    self.pipeline.on_worker_event(event).await;
                }
                else => {
                    tracing::info!("All event sources closed");
                    break;
                }
            }
        }

        self.pipeline
            .shutdown()
            .await
            .context("Failed to save catalog on shutdown")?;
        Ok(self.pipeline)
    }

    /// Returns `true` when the server should stop.
    async fn handle_line(&mut self, client: &ClientHandle, line: &str) -> bool {
        let Some(command) = Command::parse(line) else {
            return false;
        };
        tracing::debug!("Client {}: {:?}", client.id(), command);

        match dispatch(&mut self.pipeline, client, command).await {
            Dispatch::Reply(reply) => {
                if !client.send(reply.to_string()) {
                    tracing::debug!("Client {} left before its reply", client.id());
                }
                false
            }
            Dispatch::Shutdown => true,
        }
    }
}
