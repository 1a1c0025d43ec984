//! HTTP server setup.
//!
//! This module provides the router and application state used by both the
//! production server and the integration tests.

use std::sync::Arc;

use axum::{http::Request, routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::{Level, Span};

use crate::api;
use crate::config::AppConfig;
use crate::optimize::{self, ImageOptimizer};

/// Custom span maker that adds a unique request ID to each request's
/// tracing span.
#[derive(Clone, Copy)]
struct RequestIdSpan;

impl<B> MakeSpan<B> for RequestIdSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = format!("{:08x}", rand::random::<u32>());

        tracing::span!(
            Level::INFO,
            "request",
            request_id = %request_id,
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    pub optimizers: Arc<[Arc<dyn ImageOptimizer>]>,
    /// Root cancellation token; every request derives a child token from
    /// it, so shutdown reaches in-flight encoder processes.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            optimizers: optimize::default_optimizers().into(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the router: a health endpoint plus the catch-all proxy route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .fallback(api::handle_proxy)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdSpan))
}
