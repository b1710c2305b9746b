//! `teamd` — the temporary-access entitlement server.
//!
//! Usage:
//!   teamd serve -c <path> [--listen <addr>] [-- --key=value ...]
//!   teamd import-directory -c <path> --file <snapshot.json>
//!
//! Extra `--key=value` flags override the config file (see
//! `ServiceConfig::apply_args`).

mod bootstrap;
mod routes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use team_core::{Module, ServiceConfig};
use tracing::info;

/// Temporary-access entitlement server.
#[derive(Parser, Debug)]
#[command(name = "teamd", about = "Temporary elevated access entitlement server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Path to the config file.
        #[arg(short = 'c', long = "config", required = true)]
        config: PathBuf,

        /// Listen address (overrides the config file).
        #[arg(long = "listen")]
        listen: Option<String>,

        /// Additional `--key=value` overrides, after `--`.
        #[arg(last = true)]
        overrides: Vec<String>,
    },

    /// Load an organization directory snapshot into the KV store.
    ImportDirectory {
        /// Path to the config file.
        #[arg(short = 'c', long = "config", required = true)]
        config: PathBuf,

        /// JSON document `{"<ou id>": [{"id": ..., "name": ...}], ...}`.
        #[arg(long = "file", required = true)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Serve {
            config,
            listen,
            overrides,
        } => serve(config, listen, overrides).await,
        Command::ImportDirectory { config, file } => import_directory(config, file),
    }
}

fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    info!("Loading configuration from {}", path.display());
    ServiceConfig::load(path).map_err(|e| anyhow::anyhow!("failed to load config: {}", e))
}

fn open_kv(config: &ServiceConfig) -> anyhow::Result<Arc<dyn team_kv::KVStore>> {
    let path = config.resolve_db_path();
    bootstrap::ensure_parent_dir(&path)?;
    let kv = team_kv::RedbStore::open(&path)
        .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?;
    Ok(Arc::new(kv))
}

async fn serve(
    config_path: PathBuf,
    listen: Option<String>,
    overrides: Vec<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(&config_path)?.apply_args(&overrides);
    if let Some(listen) = listen {
        config.listen = listen;
    }

    // Verify configuration is valid.
    bootstrap::verify_config(&config)?;

    // Initialize embedded stores.
    let kv = open_kv(&config)?;
    let sqlite_path = config.resolve_sqlite_path();
    bootstrap::ensure_parent_dir(&sqlite_path)?;
    let sql: Arc<dyn team_sql::SQLStore> = Arc::new(
        team_sql::SqliteStore::open(&sqlite_path)
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    let module = entitlement::EntitlementModule::new(sql, kv, &config)?;
    info!(
        "Entitlement module initialized (account {}, management {})",
        config.deployment.account_id,
        config
            .deployment
            .management_account_id
            .as_deref()
            .unwrap_or("unknown")
    );

    let app = routes::build_router(vec![(module.name(), module.routes())]);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("teamd listening on {}", config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

fn import_directory(config_path: PathBuf, file: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path)?;
    let kv = open_kv(&config)?;

    let document = std::fs::read_to_string(&file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", file.display(), e))?;
    let count = entitlement::service::directory::import_snapshot(kv.as_ref(), &document)?;
    info!("Imported {} accounts from {}", count, file.display());
    Ok(())
}
