//! Text Command Protocol
//!
//! One command per line, `<VERB> <arguments>`. Every command produces exactly
//! one reply (which may span several lines) except `EXIT`, which stops the
//! server.

use crate::error::CatalogError;
use crate::executor::types::ClientHandle;
use crate::ingestion::handlers::parse_index_fields;
use crate::ingestion::pipeline::AcquisitionPipeline;
use crate::ingestion::types::AddOutcome;
use crate::storage::types::Song;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Index(String),
    Get(String),
    Search(String),
    Exit,
    Unknown(String),
}

impl Command {
    /// Splits a line into verb and arguments. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']).trim_start();
        if line.trim_end().is_empty() {
            return None;
        }

        let (verb, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command = match verb {
            "ADD" => Command::Add(args.to_string()),
            "INDEX" => Command::Index(args.to_string()),
            "GET" => Command::Get(args.to_string()),
            "SEARCH" => Command::Search(args.to_string()),
            "EXIT" => Command::Exit,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    OkAdd,
    Duplicate,
    Indexed(u32),
    Song { song: Song, offset: u64 },
    SearchResults(Vec<Song>),
    Error(&'static str),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::OkAdd => f.write_str("OK_ADD"),
            Reply::Duplicate => f.write_str("DUPLICATE"),
            Reply::Indexed(id) => write!(f, "INDEXED id={}", id),
            Reply::Song { song, offset } => write!(
                f,
                "SONG {}|{}|{}|{}|{}|{}|{}",
                song.id, song.title, song.artist, song.filename, song.url, song.duration, offset
            ),
            Reply::SearchResults(songs) => {
                write!(f, "SEARCH_RESULTS {}", songs.len())?;
                for song in songs {
                    write!(
                        f,
                        "\n{}|{}|{}|{}",
                        song.id, song.title, song.artist, song.duration
                    )?;
                }
                Ok(())
            }
            Reply::Error(reason) => write!(f, "ERROR {}", reason),
        }
    }
}

/// What the event loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Reply(Reply),
    Shutdown,
}

pub async fn dispatch(
    pipeline: &mut AcquisitionPipeline,
    client: &ClientHandle,
    command: Command,
) -> Dispatch {
    let reply = match command {
        Command::Add(args) => handle_add(pipeline, client, &args).await,
        Command::Index(args) => handle_index(pipeline, client, &args),
        Command::Get(args) => handle_get(pipeline, &args),
        Command::Search(args) => handle_search(pipeline, client, &args),
        Command::Exit => {
            tracing::info!("Client {} requested shutdown", client.id());
            return Dispatch::Shutdown;
        }
        Command::Unknown(verb) => {
            tracing::warn!("Client {}: unknown command {:?}", client.id(), verb);
            Reply::Error("unknown_command")
        }
    };
    Dispatch::Reply(reply)
}

async fn handle_add(pipeline: &mut AcquisitionPipeline, client: &ClientHandle, args: &str) -> Reply {
    let url = args.trim();
    if url.is_empty() {
        return Reply::Error("missing_url");
    }

    tracing::info!("Client {} adds {}", client.id(), url);
    match pipeline.add(url, client.clone()).await {
        AddOutcome::Queued(_) => Reply::OkAdd,
        AddOutcome::Duplicate => Reply::Duplicate,
    }
}

fn handle_index(pipeline: &mut AcquisitionPipeline, client: &ClientHandle, args: &str) -> Reply {
    let fields = match parse_index_fields(args) {
        Ok(fields) => fields,
        Err(e) => return error_reply(e),
    };

    match pipeline.index(fields) {
        Ok(id) => {
            tracing::info!("Client {} indexed song {}", client.id(), id);
            Reply::Indexed(id)
        }
        Err(e) => error_reply(e),
    }
}

fn handle_get(pipeline: &AcquisitionPipeline, args: &str) -> Reply {
    let args = args.trim();
    if args.is_empty() {
        return Reply::Error("missing_id");
    }

    let id = match args.parse::<u32>() {
        Ok(id) if id > 0 => id,
        _ => return Reply::Error("invalid_id"),
    };

    match pipeline.get(id) {
        Some((song, offset)) => Reply::Song {
            song: song.clone(),
            offset,
        },
        None => {
            tracing::debug!("Song {} not found", id);
            Reply::Error("song_not_found")
        }
    }
}

fn handle_search(pipeline: &AcquisitionPipeline, client: &ClientHandle, args: &str) -> Reply {
    if args.is_empty() {
        return Reply::Error("missing_query");
    }
    let query = args.trim();
    if query.is_empty() {
        return Reply::Error("empty_query");
    }

    let songs: Vec<Song> = pipeline.search(query).into_iter().cloned().collect();
    tracing::info!(
        "Client {} searched {:?}: {} result(s)",
        client.id(),
        query,
        songs.len()
    );
    Reply::SearchResults(songs)
}

fn error_reply(err: CatalogError) -> Reply {
    let reason = err.reason();
    if reason == "internal" {
        tracing::error!("Command failed: {}", err);
    }
    Reply::Error(reason)
}
