use anyhow::{Context, Result};
use clap::Parser;
use song_catalog::config::{Config, Overrides};
use song_catalog::executor::pool::JobScheduler;
use song_catalog::executor::worker::Downloader;
use song_catalog::ingestion::pipeline::AcquisitionPipeline;
use song_catalog::server::reactor::{Reactor, ServerEvent};
use song_catalog::server::transport;
use song_catalog::storage::store::SongStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Personal media catalog server
#[derive(Parser, Debug)]
#[command(name = "song-catalog")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SONG_CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "SONG_CATALOG_BIND")]
    bind: Option<SocketAddr>,

    /// Catalog file
    #[arg(short, long, env = "SONG_CATALOG_DATABASE")]
    database: Option<PathBuf>,

    /// Number of download workers
    #[arg(short, long, env = "SONG_CATALOG_WORKERS")]
    workers: Option<usize>,

    /// Directory downloads are written to
    #[arg(long, env = "SONG_CATALOG_MEDIA_DIR")]
    media_dir: Option<PathBuf>,

    /// Downloader executable
    #[arg(long, env = "SONG_CATALOG_DOWNLOADER")]
    downloader: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "song_catalog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?.apply(Overrides {
        bind: args.bind,
        database: args.database,
        workers: args.workers,
        media_dir: args.media_dir,
        downloader: args.downloader,
    });
    config.validate()?;

    tracing::info!("Catalog file: {}", config.database.display());
    tracing::info!("Media directory: {}", config.media_dir.display());

    std::fs::create_dir_all(&config.media_dir).with_context(|| {
        format!("Failed to create media directory {}", config.media_dir.display())
    })?;

    // 1. Catalog
    let store = SongStore::load(&config.database)
        .with_context(|| format!("Failed to load catalog {}", config.database.display()))?;

    // 2. Workers
    let (worker_tx, worker_rx) = mpsc::unbounded_channel();
    let downloader = Downloader::new(config.downloader.clone(), config.media_dir.clone());
    let scheduler = JobScheduler::spawn(config.workers, downloader, worker_tx);

    let pipeline = AcquisitionPipeline::new(store, scheduler, config.database.clone());

    // 3. Listener
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(transport::serve(listener, events_tx.clone()));
    tokio::spawn(shutdown_signal(events_tx));

    // 4. Event loop, until EXIT or a signal
    let pipeline = Reactor::new(pipeline, events_rx, worker_rx).run().await?;

    tracing::info!("Server stopped with {} song(s)", pipeline.store().len());
    Ok(())
}

/// Turns Ctrl+C (or SIGTERM) into a shutdown event for the event loop.
async fn shutdown_signal(events: mpsc::UnboundedSender<ServerEvent>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }

    let _ = events.send(ServerEvent::Shutdown);
}
