use clap::Parser;
use fleetward::{
    dispatcher::{JobDispatcher, spawn_cron_loop},
    executor::CheckExecutor,
    handlers::FwState,
    models::config::FleetwardConfig,
    probe::winrm::WinRmProbe,
    queue::WorkerQueue,
    server::{build_router, register_queue_listeners},
    store::{PgStore, Store},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fleetward-server", about = "Fleetward monitoring server")]
struct Args {
    /// Path to config.toml; falls back to FLEETWARD_CONFIG, then the
    /// default location.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()) // uses RUST_LOG
        .init();

    println!("Fleetward: Starting...");

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => FleetwardConfig::load_from(path)?,
        None => FleetwardConfig::load()?,
    };
    cfg.validate_db_connection().await?;

    debug!("======== INITIALIZING DATABASE ========");
    let pool = cfg.db_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let probe = Arc::new(WinRmProbe::new(cfg.winrm_config()));
    let executor = Arc::new(CheckExecutor::new(store.clone(), probe.clone()));

    let queue_cfg = cfg.queue_config();
    let queue = WorkerQueue::start(&queue_cfg, executor);
    register_queue_listeners(store.clone(), queue.as_ref());

    let dispatcher = Arc::new(JobDispatcher::new(store.clone(), queue.clone()));
    dispatcher.register_active_jobs().await?;
    spawn_cron_loop(dispatcher.clone(), queue_cfg.cron_poll_interval);

    let server_cfg = cfg.server_config();
    info!("Starting Fleetward server...");
    info!("Host: {}", server_cfg.host);
    info!("Port: {}", server_cfg.port);

    let state = FwState::new(store, probe, dispatcher);
    let app = build_router(state);

    let listener = TcpListener::bind(server_cfg.bind_address()).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
