//! tabwardend - The tabwarden native-messaging service
//!
//! The browser starts this process when the extension connects and talks to
//! it over stdin/stdout. It wires together:
//! - Configuration loading
//! - Store initialization
//! - Core engine
//! - Native-messaging server and browser host
//!
//! Logs go to stderr; stdout carries the native-messaging frames.

mod service;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabwarden_config::load_config_or_default;
use tabwarden_core::CoreEngine;
use tabwarden_host_api::BrowserHost;
use tabwarden_host_native::NativeBrowserHost;
use tabwarden_ipc::{IpcServer, ServerMessage};
use tabwarden_store::{SqliteStore, Store};
use tabwarden_util::{DATABASE_FILENAME, MonotonicInstant, default_config_path};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::service::Service;

/// Interval of the driver that advances debounces and timers
const DRIVER_INTERVAL: Duration = Duration::from_millis(100);

/// tabwardend - Limits time spent on distracting websites
#[derive(Parser, Debug)]
#[command(name = "tabwardend")]
#[command(about = "Limits time spent on distracting websites", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/tabwarden/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set TABWARDEN_DATA_DIR env var)
    #[arg(short, long, env = "TABWARDEN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Arguments the browser appends (manifest path, extension origin)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    browser_args: Vec<String>,
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    let policy = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    info!(
        config_path = %args.config.display(),
        blacklist_defaults = policy.default_sites.len(),
        daily_budget_secs = policy.budget.daily_seconds,
        "Configuration loaded"
    );

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| policy.service.data_dir.clone());

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    // Initialize store
    let db_path = data_dir.join(DATABASE_FILENAME);
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?,
    );

    info!(db_path = %db_path.display(), "Store initialized");

    // Native messaging over stdio
    let ipc = IpcServer::stdio();
    let mut messages = ipc
        .take_message_receiver()
        .await
        .context("Message receiver already taken")?;
    let host_frames = ipc
        .take_host_receiver()
        .await
        .context("Host receiver already taken")?;

    let host = Arc::new(NativeBrowserHost::new(ipc.sender(), host_frames));
    let mut host_events = host.subscribe();

    let maintenance_every = policy.scheduler.maintenance;
    let engine = CoreEngine::new(policy, store.clone(), tabwarden_util::now());
    let mut service = Service::new(engine, host, store);

    // Badge and any overdue reset before the first event
    service.maintenance(tabwarden_util::now()).await;

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    let mut driver = tokio::time::interval(DRIVER_INTERVAL);
    driver.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut maintenance = tokio::time::interval_at(
        tokio::time::Instant::now() + maintenance_every,
        maintenance_every,
    );
    maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Service running");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                break;
            }

            _ = driver.tick() => {
                service.tick(MonotonicInstant::now(), tabwarden_util::now()).await;
            }

            _ = maintenance.tick() => {
                debug!("Running maintenance");
                service.maintenance(tabwarden_util::now()).await;
            }

            Some(event) = host_events.recv() => {
                service
                    .handle_host_event(event, MonotonicInstant::now(), tabwarden_util::now())
                    .await;
            }

            Some(message) = messages.recv() => match message {
                ServerMessage::Request(request) => {
                    let response =
                        service.handle_request(request, MonotonicInstant::now(), tabwarden_util::now());
                    if let Err(e) = ipc.send_response(response) {
                        warn!(error = %e, "Failed to send response");
                    }
                }
                ServerMessage::Disconnected => {
                    info!("Extension disconnected, shutting down");
                    break;
                }
            },
        }
    }

    service.shutdown();
    info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        browser_args = ?args.browser_args,
        "tabwardend starting"
    );

    run(args).await
}
