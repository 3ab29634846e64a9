//! Earcue - push notification backend for wearable audio devices
//!
//! Pairs devices with one-shot codes, queues text and audio notifications,
//! and hands them out over long-polling HTTP with ffmpeg-converted audio.

use anyhow::Result;
use clap::Parser;
use earcue_audio::{BlobStore, Transcoder};
use earcue_auth::{AuthGuard, PairingManager};
use earcue_core::Config;
use earcue_queue::MessageQueue;
use earcue_server::{create_router, AppState};
use earcue_store::Database;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Earcue - queue and deliver audio notifications to paired devices
#[derive(Parser, Debug)]
#[command(name = "earcue")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "/data/app.db")]
    db_path: PathBuf,

    /// Directory for converted audio blobs
    #[arg(long, env = "BLOB_DIR", default_value = "/data/blobs")]
    blob_dir: PathBuf,

    /// Bearer token for operator endpoints
    #[arg(long, env = "ADMIN_TOKEN", default_value = earcue_core::DEV_ADMIN_TOKEN)]
    admin_token: String,

    /// ffmpeg binary name or path
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg_path: String,

    /// Message time-to-live in seconds when the enqueue request sets none
    #[arg(long, env = "DEFAULT_MESSAGE_TTL_SECONDS", default_value_t = 600)]
    default_ttl: i64,

    /// Pairing code lifetime in seconds
    #[arg(long, env = "PAIRING_CODE_TTL_SECONDS", default_value_t = 300)]
    pairing_ttl: i64,

    /// Long-poll wait in seconds when the request sets none
    #[arg(long, env = "LONGPOLL_TIMEOUT_SECONDS", default_value_t = 45)]
    poll_timeout: u64,

    /// Seconds between background sweeps of expired messages
    #[arg(long, default_value_t = 60)]
    sweep_interval: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Earcue v{}", env!("CARGO_PKG_VERSION"));

    // Create configuration
    let config = Config::new()
        .with_port(args.port)
        .with_db_path(args.db_path)
        .with_blob_dir(args.blob_dir)
        .with_admin_token(args.admin_token)
        .with_ffmpeg_path(args.ffmpeg_path)
        .with_default_ttl_seconds(args.default_ttl)
        .with_pairing_code_ttl_seconds(args.pairing_ttl)
        .with_default_poll_timeout_seconds(args.poll_timeout)
        .with_sweep_interval_seconds(args.sweep_interval);

    if config.uses_dev_admin_token() {
        warn!("Using the development admin token; set ADMIN_TOKEN before exposing this server");
    }

    // Open storage
    info!("Opening database at {:?}", config.db_path);
    let db = Database::open(&config.db_path).await?;

    let blobs = BlobStore::new(db.clone(), config.blob_dir.clone());
    blobs.init().await?;

    let transcoder = Transcoder::new(config.ffmpeg_path.clone());
    if !transcoder.is_available().await {
        warn!(
            "ffmpeg not found at {:?}; audio uploads will fail",
            config.ffmpeg_path
        );
    }

    // Wire services
    let guard = AuthGuard::new(db.clone(), config.admin_token.clone());
    let pairing = PairingManager::new(db.clone(), config.pairing_code_ttl_seconds);
    let queue = MessageQueue::new(db.clone(), config.default_ttl_seconds);

    let paired_count = pairing.list_devices().await?.len();
    info!("{} device(s) paired", paired_count);

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        guard,
        pairing,
        queue,
        blobs,
        transcoder,
    ));

    // Spawn background task to reclaim expired queued messages
    let sweep_state = state.clone();
    let sweep_every = Duration::from_secs(config.sweep_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            match sweep_state.queue.sweep_expired().await {
                Ok(removed) if removed > 0 => {
                    info!(removed, "Expired message sweep completed");
                }
                Err(e) => {
                    warn!(error = %e, "Expired message sweep failed");
                }
                _ => {}
            }
        }
    });

    // Create router
    let router = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on http://{}", addr);
    info!("Press Ctrl+C to stop.");

    // Run server with graceful shutdown
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Goodbye!");
    Ok(())
}
