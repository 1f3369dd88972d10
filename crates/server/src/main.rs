use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use snaggle_core::candidate::CandidateCache;
use snaggle_core::import::{ImportTaskStore, SqliteMediaCatalog};
use snaggle_core::job::JobStore;
use snaggle_core::placer::FsPlacer;
use snaggle_core::{
    load_config, validate_config, AuditLog, CandidateService, DownloaderRegistry, EventPublisher,
    ImportService, ImportWorker, JobService, JobWorker, PolicyEngine, SettingsService,
    SqliteAuditStore, SqliteImportTaskStore, SqliteJobStore, SqlitePolicyStore,
    SqliteSettingsStore, WorkerRunner,
};
use snaggle_server::{create_router, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the change event channel
const EVENT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let json = std::env::var("SNAGGLE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(fmt_layer)
        .init();
}

async fn run() -> Result<()> {
    init_logging();

    // Determine config path
    let config_path = std::env::var("SNAGGLE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        database = ?config.database.path,
        "Configuration loaded"
    );

    let db_path = config.database.path.clone();

    // Stores share one database file
    let audit = AuditLog::new(Arc::new(
        SqliteAuditStore::new(&db_path).context("Failed to create audit store")?,
    ));
    let job_store: Arc<dyn JobStore> =
        Arc::new(SqliteJobStore::new(&db_path).context("Failed to create job store")?);
    let task_store: Arc<dyn ImportTaskStore> = Arc::new(
        SqliteImportTaskStore::new(&db_path).context("Failed to create import task store")?,
    );
    let policy_store = Arc::new(
        SqlitePolicyStore::new(&db_path).context("Failed to create policy store")?,
    );
    let catalog = Arc::new(
        SqliteMediaCatalog::new(&db_path).context("Failed to create media catalog")?,
    );
    let settings = Arc::new(SettingsService::new(Arc::new(
        SqliteSettingsStore::new(&db_path).context("Failed to create settings store")?,
    )));
    info!("Stores initialized");

    let downloaders = DownloaderRegistry::from_config(&config.downloaders)
        .context("Failed to create downloaders")?;
    info!(downloaders = ?downloaders.ids(), "Downloaders registered");

    let events = EventPublisher::new(EVENT_BUFFER_SIZE);

    let engine = PolicyEngine::new(policy_store).with_defaults(config.plan_defaults());
    let candidates = CandidateService::new(
        CandidateCache::new(config.candidates.ttl()),
        engine,
        Arc::clone(&job_store),
        Arc::clone(&settings),
        audit.clone(),
        events.clone(),
    );
    let jobs = JobService::new(
        Arc::clone(&job_store),
        Arc::clone(&task_store),
        audit.clone(),
        events.clone(),
    );
    let imports = ImportService::new(Arc::clone(&task_store), audit.clone(), events.clone());

    let runner = if config.workers.enabled {
        let config = Arc::new(config.clone());
        let job_worker = JobWorker::new(
            Arc::clone(&job_store),
            Arc::clone(&task_store),
            downloaders.clone(),
            Arc::clone(&settings),
            audit.clone(),
            events.clone(),
        )
        .with_claim(config.workers.job_claim_limit, config.workers.job_lease());
        let import_worker = ImportWorker::new(
            Arc::clone(&task_store),
            Arc::clone(&job_store),
            downloaders,
            Arc::new(FsPlacer::new(config.placer.clone())),
            catalog,
            Arc::clone(&config),
            Arc::clone(&settings),
            audit.clone(),
            events.clone(),
        );
        let runner = WorkerRunner::new(
            Arc::new(job_worker),
            Arc::new(import_worker),
            Arc::clone(&task_store),
            config.workers.job_poll_interval(),
            config.workers.import_poll_interval(),
        )
        .with_stale_import_age(config.workers.stale_import_age());
        runner.start();
        Some(runner)
    } else {
        info!("Workers disabled");
        None
    };

    let state = Arc::new(AppState::new(
        config.clone(),
        candidates,
        jobs,
        imports,
        settings,
        events,
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Some(runner) = runner {
        runner.stop();
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
