//! HTTP gateway
//!
//! Public routes (`/health`, `/users`, `/users/login`) and bearer-token
//! protected routes (`/accounts`, `/transfers`) under `/api/v1`.

pub mod handlers;
pub mod middleware;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::store::TxBackend;
use handlers::{accounts, health, transfers, users};
use state::AppState;

/// Build the gateway router over `state`
pub fn router<B: TxBackend>(state: Arc<AppState<B>>) -> Router {
    let private = Router::new()
        .route("/accounts", post(accounts::create_account::<B>))
        .route("/accounts/{id}", get(accounts::get_account::<B>))
        .route("/transfers", post(transfers::create_transfer::<B>))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::bearer_auth::<B>,
        ));

    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/users", post(users::create_user::<B>))
        .route("/users/login", post(users::login_user::<B>))
        .merge(private);

    Router::new().nest("/api/v1", api).with_state(state)
}

/// Start HTTP Gateway server; returns when ctrl-c is received
pub async fn run_server<B: TxBackend>(
    host: &str,
    port: u16,
    state: Arc<AppState<B>>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind to {} (port may already be in use): {}", addr, e)
    })?;

    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
