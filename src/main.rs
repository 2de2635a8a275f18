//! Simple Bank - HTTP server entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌────────────┐
//! │  Config  │───▶│ Gateway  │───▶│  Store   │───▶│ PostgreSQL │
//! │  (YAML)  │    │ (axum)   │    │(exec_tx) │    │ (or memory)│
//! └──────────┘    └──────────┘    └──────────┘    └────────────┘
//! ```
//!
//! Flags: `--env <name>` selects `config/<name>.yaml`, `--port <n>` overrides
//! the configured port, `--memory` ignores `postgres_url` and serves from the
//! in-memory store.

use std::sync::Arc;

use anyhow::Context;

use simple_bank::config::AppConfig;
use simple_bank::db::Database;
use simple_bank::gateway::{self, state::AppState};
use simple_bank::logging::init_logging;
use simple_bank::store::{MemoryBackend, PgBackend, Store, TxBackend};
use simple_bank::token::{JwtAuthenticator, TokenAuthenticator};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn use_memory_store() -> bool {
    std::env::args().any(|a| a == "--memory")
}

async fn serve<B: TxBackend>(config: &AppConfig, backend: B) -> anyhow::Result<()> {
    let store = Arc::new(Store::with_options(
        backend,
        config.transfer.store_options(),
    ));
    let tokens: Arc<dyn TokenAuthenticator> = Arc::new(
        JwtAuthenticator::new(&config.token.symmetric_key).context("Invalid token.symmetric_key")?,
    );
    let state = Arc::new(AppState::new(
        store,
        tokens,
        config.token.access_token_duration(),
    ));

    let port = get_port_override().unwrap_or(config.server.port);
    gateway::run_server(&config.server.host, port, state).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);

    tracing::info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        allow_overdraft = config.transfer.allow_overdraft,
        tx_timeout_ms = ?config.transfer.tx_timeout_ms,
        "Starting simple_bank"
    );

    match (&config.postgres_url, use_memory_store()) {
        (Some(url), false) => {
            let db = Database::connect(url, config.db_max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to apply migrations")?;
            serve(&config, PgBackend::new(db.pool().clone())).await
        }
        _ => {
            tracing::warn!("Serving from the in-memory store; data is lost on exit");
            serve(&config, MemoryBackend::new()).await
        }
    }
}
