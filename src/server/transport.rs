//! TCP Transport
//!
//! Accepts connections and moves newline-terminated lines between sockets and
//! the event loop. Each connection gets a reader that forwards lines as
//! [`ServerEvent::Command`] and a writer task that drains the connection's
//! reply queue.
//!
//! Lines are framed as raw bytes and decoded lossily, so malformed UTF-8 from
//! a client turns into U+FFFD instead of ending the session.

use super::reactor::ServerEvent;
use crate::executor::types::ClientHandle;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead, FramedWrite, LinesCodec};

/// Longest accepted command line; longer input closes the connection.
pub const MAX_LINE: usize = 16 * 1024;

/// Accepts clients forever, one task per connection.
pub async fn serve(listener: TcpListener, events: mpsc::UnboundedSender<ServerEvent>) -> Result<()> {
    let local = listener.local_addr().context("Listener has no local address")?;
    tracing::info!("Listening on {}", local);

    let mut next_client: u64 = 1;
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Accept failed: {}", e);
                continue;
            }
        };

        let client_id = next_client;
        next_client += 1;

        let events = events.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, client_id, events).await {
                tracing::warn!("Client {} ({}) dropped: {:#}", client_id, peer, e);
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    client_id: u64,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> Result<()> {
    tracing::info!("Client {} connected from {}", client_id, peer);

    let (reader, writer) = stream.into_split();
    let mut lines = FramedRead::new(
        reader,
        AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), MAX_LINE),
    );
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();
    let client = ClientHandle::new(client_id, reply_tx);

    // Outlives the reader while jobs still hold the handle for their notices.
    tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            if let Err(e) = sink.send(reply).await {
                tracing::debug!("Client {}: write failed: {}", client_id, e);
                break;
            }
        }
    });

    let result = async {
        while let Some(line) = lines.next().await {
            let line = line.context("Unreadable line")?;
            let line = String::from_utf8_lossy(&line).into_owned();
            events
                .send(ServerEvent::Command {
                    client: client.clone(),
                    line,
                })
                .ok()
                .context("Event loop has stopped")?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tracing::info!("Client {} disconnected", client_id);
    result
}
