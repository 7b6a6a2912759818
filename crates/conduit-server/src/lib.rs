// SPDX-License-Identifier: Apache-2.0
//! The HTTP entrypoint (`spec.md` §6.1): builds the axum router and runs
//! it with graceful shutdown.

pub mod error;
pub mod headers;
pub mod http;
pub mod routes;
pub mod state;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::http::security::{csrf_guard, security_headers};
use crate::state::AppState;

/// 10 MiB: generous for chat payloads (tool results, long context) without
/// letting an unbounded body tie up a connection.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/v1/chat/completions", post(routes::chat::chat_completions))
        .route("/v1/messages", post(routes::messages::messages))
        .route("/v1/models", get(routes::models::list_models))
        .route(
            "/v1/sessions/:id",
            get(routes::sessions::get_session)
                .put(routes::sessions::put_session)
                .delete(routes::sessions::delete_session),
        )
        .route("/v1/webhooks/:name", post(routes::webhooks::handle_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(csrf_guard))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server; binds to `0.0.0.0:{port}`. Graceful shutdown on
/// Ctrl+C (SIGINT) and SIGTERM (Unix); in-flight requests complete first.
pub async fn run_http(state: AppState, port: u16) -> Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "conduit listening (Ctrl+C/SIGTERM to stop)");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("conduit stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
