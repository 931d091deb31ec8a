//! elaudit-fc - EL audit field client
//!
//! Local service for one technician device: serves the tablet UI API,
//! mirrors audit state into SQLite and synchronizes with the remote Hub.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use elaudit_common::config::{self, FieldConfig};
use elaudit_common::events::EventBus;
use elaudit_fc::hub::HubClient;
use elaudit_fc::engine::SyncEngine;
use elaudit_fc::{build_router, db, scheduler, AppState};

#[derive(Debug, Parser)]
#[command(name = "elaudit-fc", about = "EL audit field client")]
struct Args {
    /// Audit token this device works on
    #[arg(long, env = "ELAUDIT_AUDIT_TOKEN")]
    audit_token: String,

    /// Root folder for local data (overrides env and config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the Hub base URL
    #[arg(long)]
    hub_url: Option<String>,

    /// Override the local bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting EL audit field client (elaudit-fc) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), "ELAUDIT_ROOT");
    config::ensure_root_folder(&root_folder)?;

    let mut field_config = FieldConfig::load(args.config.as_deref())?;
    if let Some(hub_url) = args.hub_url {
        field_config.hub_url = hub_url;
    }
    if let Some(bind) = args.bind {
        field_config.bind_addr = bind;
    }

    let db_path = config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let pool = db::init_database_pool(&db_path).await?;

    let identity = db::state::get_or_init_identity(&pool).await?;
    info!(
        technician_id = %identity.id,
        technician_name = %identity.name,
        "Technician identity loaded"
    );

    let hub = HubClient::new(&field_config.hub_url, &args.audit_token)?;
    info!(hub_url = %field_config.hub_url, audit_token = %args.audit_token, "Hub client ready");

    let events = EventBus::new(100);
    let engine = SyncEngine::create(pool, hub, identity, events).await?;

    let scheduler_handle = scheduler::start(engine.clone(), field_config.intervals.clone());

    let state = AppState::new(engine.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&field_config.bind_addr).await?;
    info!("elaudit-fc listening on http://{}", field_config.bind_addr);
    info!("Health check: http://{}/health", field_config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown path: stop the timers first, then persist before exit.
    // Anything still in flight is abandoned; the persisted snapshot covers it.
    scheduler_handle.stop().await;
    engine.teardown().await?;
    info!("Session persisted, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
