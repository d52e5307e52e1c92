pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;

use openapi::ApiDoc;
use state::AppState;

/// Build the HTTP router
///
/// | Method | Path                    | Handler                      |
/// |--------|-------------------------|------------------------------|
/// | POST   | /reset                  | reseed accounts              |
/// | POST   | /transfer/unsafe        | sender-then-receiver locking |
/// | POST   | /transfer/safe          | ascending-id locking         |
/// | GET    | /accounts               | committed balances           |
/// | GET    | /health                 | store liveness               |
/// | GET    | /api-docs/openapi.json  | OpenAPI document             |
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/reset", post(handlers::reset))
        .route("/transfer/unsafe", post(handlers::transfer_unsafe))
        .route("/transfer/safe", post(handlers::transfer_safe))
        .route("/accounts", get(handlers::list_accounts))
        .route("/health", get(handlers::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .with_state(state)
}

/// Serve the gateway on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        store = state.engine.store().name(),
        hold_delay_ms = state.engine.hold_delay().as_millis() as u64,
        "Gateway listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `host:port` and serve until Ctrl-C
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Shutdown signal received");
    })
    .await?;
    Ok(())
}
