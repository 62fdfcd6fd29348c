//! Worker Channel Protocol
//!
//! Length-prefixed frames exchanged between the coordinator and its workers:
//!
//! ```text
//! [type: u8][payload length: u32 LE][payload]
//! ```
//!
//! Payloads longer than [`MAX_PAYLOAD`] are rejected on both ends, never
//! truncated. Reads and writes loop until the whole frame is transferred; a
//! closed peer surfaces as `CatalogError::ChannelClosed`.

use crate::error::{CatalogError, Result};

use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_PAYLOAD: usize = 4096;
const FRAME_HEADER: usize = 5;

pub const MSG_REQUEST: u8 = 1;
pub const MSG_FINISHED: u8 = 2;
pub const MSG_SHUTDOWN: u8 = 3;
pub const MSG_METADATA: u8 = 4;
pub const MSG_FAILED: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Coordinator → worker: acquire this url.
    Request { url: String },
    /// Worker → coordinator: `title\nartist\nduration\nurl` as printed by the downloader.
    Metadata { payload: String },
    /// Worker → coordinator: the job for `url` completed.
    Finished { url: String },
    /// Worker → coordinator: the downloader could not start or exited unsuccessfully.
    Failed { url: String, status: String },
    /// Coordinator → worker: leave the job loop.
    Shutdown,
}

impl WorkerMessage {
    pub fn kind(&self) -> u8 {
        match self {
            WorkerMessage::Request { .. } => MSG_REQUEST,
            WorkerMessage::Metadata { .. } => MSG_METADATA,
            WorkerMessage::Finished { .. } => MSG_FINISHED,
            WorkerMessage::Failed { .. } => MSG_FAILED,
            WorkerMessage::Shutdown => MSG_SHUTDOWN,
        }
    }

    fn payload(&self) -> String {
        match self {
            WorkerMessage::Request { url } | WorkerMessage::Finished { url } => url.clone(),
            WorkerMessage::Metadata { payload } => payload.clone(),
            WorkerMessage::Failed { url, status } => format!("{}\n{}", url, status),
            WorkerMessage::Shutdown => String::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = self.payload();
        if payload.len() > MAX_PAYLOAD {
            return Err(CatalogError::FrameTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
        frame.push(self.kind());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload.as_bytes());
        Ok(frame)
    }

    pub fn decode(kind: u8, payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload).into_owned();
        match kind {
            MSG_REQUEST => Ok(WorkerMessage::Request { url: text }),
            MSG_METADATA => Ok(WorkerMessage::Metadata { payload: text }),
            MSG_FINISHED => Ok(WorkerMessage::Finished { url: text }),
            MSG_FAILED => {
                let (url, status) = text.split_once('\n').unwrap_or((text.as_str(), ""));
                Ok(WorkerMessage::Failed {
                    url: url.to_string(),
                    status: status.to_string(),
                })
            }
            MSG_SHUTDOWN => Ok(WorkerMessage::Shutdown),
            other => Err(CatalogError::UnknownMessageType(other)),
        }
    }
}

/// Writes one complete frame and flushes it.
pub async fn write_message<W>(writer: &mut W, message: &WorkerMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = message.encode()?;
    writer.write_all(&frame).await.map_err(closed_or_io)?;
    writer.flush().await.map_err(closed_or_io)?;
    Ok(())
}

/// Reads one complete frame.
pub async fn read_message<R>(reader: &mut R) -> Result<WorkerMessage>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER];
    reader.read_exact(&mut header).await.map_err(closed_or_io)?;

    let kind = header[0];
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_PAYLOAD {
        return Err(CatalogError::FrameTooLarge {
            len,
            max: MAX_PAYLOAD,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(closed_or_io)?;

    WorkerMessage::decode(kind, &payload)
}

fn closed_or_io(err: std::io::Error) -> CatalogError {
    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => {
            CatalogError::ChannelClosed
        }
        _ => CatalogError::Io(err),
    }
}
