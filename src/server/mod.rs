//! HTTP surface for the diagnostics and keepalive entry points.

mod handlers;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::health::recovery::RecoveryController;
use crate::health::report;
use crate::sandbox::SessionRegistry;

pub(crate) const DIAGNOSE_PATH: &str = "/api/diagnose-vite";
pub(crate) const KEEPALIVE_PATH: &str = "/api/sandbox-keepalive";

#[derive(Clone)]
pub(crate) struct AppState {
    pub registry: SessionRegistry,
    pub controller: Arc<RecoveryController>,
}

impl AppState {
    pub fn new(registry: SessionRegistry, controller: RecoveryController) -> Self {
        Self {
            registry,
            controller: Arc::new(controller),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        self.controller.config().command_timeout()
    }
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route(DIAGNOSE_PATH, get(handlers::diagnose_vite))
        .route(KEEPALIVE_PATH, post(handlers::sandbox_keepalive))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Serves the app on `listener` until Ctrl-C.
pub(crate) async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "Unknown panic".to_string()
    };
    error!("Request handler panicked: {}", message);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(report::internal_error_body(&message)),
    )
        .into_response()
}
