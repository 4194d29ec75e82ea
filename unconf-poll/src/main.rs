//! unconf-poll - live session poll server
//!
//! Serves the poll widget's vote and results API, persists votes on this
//! device and mirrors them to a shared realtime store when one is
//! configured.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unconf_common::config::{
    configured_remote_url, load_toml_config, resolve_root_folder, ROOT_FOLDER_ENV,
};
use unconf_common::db::{init_database, LocalStorage, DATABASE_FILE_NAME};
use unconf_common::events::EventBus;
use unconf_common::ClientIdentity;
use unconf_poll::remote::FirebaseRemote;
use unconf_poll::store::LocalVoteStore;
use unconf_poll::sync::RemoteSyncAdapter;
use unconf_poll::view::BusView;
use unconf_poll::{build_router, spawn_poll_loop, AppState, PollWidget};

/// Buffered events per SSE subscriber before lagging ones skip ahead
const EVENT_BUS_CAPACITY: usize = 1000;

/// Command-line arguments for unconf-poll
#[derive(Parser, Debug)]
#[command(name = "unconf-poll")]
#[command(about = "Live session poll for unconference attendees")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the on-device vote database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long, env = "UNCONF_BIND")]
    bind: Option<String>,

    /// Realtime database URL (overrides the config file)
    #[arg(long, env = "UNCONF_REMOTE_URL")]
    remote_url: Option<String>,

    /// Auth token for the realtime database
    #[arg(long, env = "UNCONF_REMOTE_AUTH")]
    remote_auth: Option<String>,

    /// Keep votes on this device even if a remote store is configured
    #[arg(long)]
    local_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Source is logged once the subscriber is installed
    let (config, config_source) =
        load_toml_config(args.config.as_deref()).context("Failed to load config")?;

    let level = config.log_level();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "unconf_poll={level},unconf_common={level},tower_http={level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting unconf-poll v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let catalog = Arc::new(config.catalog().context("Invalid session catalog")?);
    info!("Session catalog: {} sessions", catalog.len());

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = root_folder.join(DATABASE_FILE_NAME);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open on-device storage")?;
    let storage = LocalStorage::new(pool);

    let store = LocalVoteStore::load(catalog.clone(), storage.clone())
        .await
        .context("Failed to load stored votes")?;

    let remote = if args.local_only {
        info!("Local-only mode requested; votes stay on this device");
        None
    } else {
        match configured_remote_url(args.remote_url.as_deref(), &config) {
            Some(url) => {
                let auth = args.remote_auth.clone().or_else(|| config.remote.auth.clone());
                match FirebaseRemote::new(url, auth) {
                    Ok(remote) => {
                        info!("Remote store: {}", url);
                        Some(remote)
                    }
                    Err(e) => {
                        warn!("{}; votes stay on this device", e);
                        None
                    }
                }
            }
            None => {
                warn!("No remote store configured; votes stay on this device");
                None
            }
        }
    };

    // Identity is created on first use of a remote store
    let sync = match remote {
        Some(remote) => {
            let identity = ClientIdentity::load_or_create(&storage)
                .await
                .context("Failed to load client identity")?;
            info!("Client identity: {}", identity);
            RemoteSyncAdapter::with_remote(Arc::new(remote), identity)
        }
        None => RemoteSyncAdapter::local_only(),
    };

    let bus = EventBus::new(EVENT_BUS_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    sync.connect(inbound_tx, &bus).await;

    let mut widget = PollWidget::new(store, sync, BusView::new(bus.clone()), bus.clone());
    widget.restore();

    let (poll, _poll_task) = spawn_poll_loop(widget, inbound_rx);

    let state = AppState::new(poll, bus, catalog);
    let app = build_router(state);

    let bind = args
        .bind
        .clone()
        .unwrap_or_else(|| config.bind_address().to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("unconf-poll listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
