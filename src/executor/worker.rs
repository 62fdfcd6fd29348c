//! Worker Job Loop
//!
//! A worker owns the reading end of its request channel and the writing end of
//! its response channel. It serves one job at a time: for each REQUEST it runs
//! the external downloader, forwards the metadata the downloader prints, waits
//! for the process to exit and reports the outcome.
//!
//! The downloader is an opaque command. Its first `metadata_lines` lines of
//! stdout are taken as `title`, `artist`, `duration`; everything after that is
//! drained and ignored.

use super::protocol::{MAX_PAYLOAD, WorkerMessage, read_message, write_message};
use crate::error::{CatalogError, Result};

use serde::Deserialize;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::Command;

/// How to invoke the external downloader.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DownloaderConfig {
    pub program: String,
    /// Arguments; `{url}` and `{media_dir}` are substituted per job.
    pub args: Vec<String>,
    /// Lines of stdout that make up the metadata block.
    pub metadata_lines: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            args: [
                "--quiet",
                "--no-warnings",
                "--no-simulate",
                "--print",
                "before_dl:%(title)s\n%(artist,uploader)s\n%(duration)s",
                "-x",
                "--audio-format",
                "mp3",
                "-o",
                "{media_dir}/%(title)s.%(ext)s",
                "{url}",
            ]
            .iter()
            .map(|arg| arg.to_string())
            .collect(),
            metadata_lines: 3,
        }
    }
}

/// A configured downloader bound to a media directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    config: DownloaderConfig,
    media_dir: PathBuf,
}

impl Downloader {
    pub fn new(config: DownloaderConfig, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            media_dir: media_dir.into(),
        }
    }

    /// Arguments for one job with the templates filled in.
    pub fn args_for(&self, url: &str) -> Vec<String> {
        let media_dir = self.media_dir.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| arg.replace("{media_dir}", &media_dir).replace("{url}", url))
            .collect()
    }

    fn command(&self, url: &str) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(self.args_for(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }

    /// Runs the downloader for `url`, reporting to `responses`.
    ///
    /// A downloader that cannot be started or exits unsuccessfully is reported
    /// as FAILED. Only a broken response channel is an error here.
    pub async fn acquire<W>(&self, worker_id: usize, url: &str, responses: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut child = match self.command(url).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    "Worker {} could not start '{}': {}",
                    worker_id,
                    self.config.program,
                    e
                );
                let failed = WorkerMessage::Failed {
                    url: url.to_string(),
                    status: format!("spawn failed: {}", e),
                };
                return write_message(responses, &failed).await;
            }
        };

        let status = match child.stdout.take() {
            Some(stdout) => {
                let mut reader = BufReader::new(stdout);
                let lines = read_metadata(&mut reader, self.config.metadata_lines).await;
                if let Some(payload) = metadata_payload(&lines, url) {
                    self.send_metadata(worker_id, payload, responses).await?;
                }

                // Keep the pipe open until exit so the downloader never sees EPIPE.
                let (status, _) = tokio::join!(child.wait(), drain(&mut reader));
                status
            }
            None => child.wait().await,
        };

        let outcome = match status {
            Ok(status) if status.success() => WorkerMessage::Finished {
                url: url.to_string(),
            },
            Ok(status) => {
                tracing::warn!("Worker {}: downloader for {} {}", worker_id, url, status);
                WorkerMessage::Failed {
                    url: url.to_string(),
                    status: describe(status),
                }
            }
            Err(e) => {
                tracing::error!("Worker {}: waiting for downloader failed: {}", worker_id, e);
                WorkerMessage::Failed {
                    url: url.to_string(),
                    status: e.to_string(),
                }
            }
        };

        write_message(responses, &outcome).await
    }

    async fn send_metadata<W>(&self, worker_id: usize, payload: String, responses: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match write_message(responses, &WorkerMessage::Metadata { payload }).await {
            Err(CatalogError::FrameTooLarge { len, max }) => {
                tracing::warn!(
                    "Worker {}: metadata of {} bytes exceeds {} and was dropped",
                    worker_id,
                    len,
                    max
                );
                Ok(())
            }
            other => other,
        }
    }
}

/// Serves jobs until SHUTDOWN arrives or the request channel closes.
pub async fn worker_loop<R, W>(worker_id: usize, mut requests: R, mut responses: W, downloader: Downloader)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!("Worker {} started", worker_id);

    loop {
        let message = match read_message(&mut requests).await {
            Ok(message) => message,
            Err(CatalogError::ChannelClosed) => {
                tracing::info!("Worker {}: request channel closed", worker_id);
                break;
            }
            Err(e) => {
                tracing::error!("Worker {}: unreadable request: {}", worker_id, e);
                break;
            }
        };

        match message {
            WorkerMessage::Request { url } => {
                tracing::info!("Worker {} acquiring {}", worker_id, url);
                if let Err(e) = downloader.acquire(worker_id, &url, &mut responses).await {
                    tracing::error!("Worker {}: response channel failed: {}", worker_id, e);
                    break;
                }
            }
            WorkerMessage::Shutdown => {
                tracing::info!("Worker {} shutting down", worker_id);
                break;
            }
            other => {
                tracing::warn!("Worker {} ignoring unexpected {:?}", worker_id, other);
            }
        }
    }
}

/// Reads up to `count` lines, stopping early at EOF or once the block would no
/// longer fit in a frame.
async fn read_metadata<R>(reader: &mut R, count: usize) -> Vec<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::with_capacity(count);
    let mut total = 0;

    while lines.len() < count {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                // Malformed UTF-8 becomes U+FFFD, which the tokenizer treats as a separator
                let line = String::from_utf8_lossy(&line);
                lines.push(line.trim_end_matches(['\r', '\n']).to_string());
                if total > MAX_PAYLOAD {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Unreadable downloader output: {}", e);
                break;
            }
        }
    }
    lines
}

/// `title\nartist\nduration\nurl`, or `None` when the downloader printed nothing.
fn metadata_payload(lines: &[String], url: &str) -> Option<String> {
    if lines.iter().all(|line| line.is_empty()) {
        return None;
    }
    let mut payload = lines.join("\n");
    payload.push('\n');
    payload.push_str(url);
    Some(payload)
}

async fn drain<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    if let Err(e) = tokio::io::copy(reader, &mut tokio::io::sink()).await {
        tracing::debug!("Stopped draining downloader output: {}", e);
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit {}", code),
        None => "terminated by signal".to_string(),
    }
}
