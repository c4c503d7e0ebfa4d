//! # FarmWise API service library
//!
//! HTTP front end over `farmwise-core`: the health endpoint, the prediction
//! endpoint, body limits, and the CORS response headers.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use once_cell::sync::OnceCell;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use farmwise_core::Predictor;

pub mod config;
pub mod handlers;

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across HTTP handlers.
///
/// `ready` is set exactly once by the startup task. Handlers see `None`
/// until the model is provisioned and loaded, and the same predictor forever
/// after; readiness never reverts.
#[derive(Clone)]
pub struct AppState {
    pub ready: Arc<OnceCell<Arc<Predictor>>>,
    pub service_name: String,
}

impl AppState {
    /// State that starts out loading.
    pub fn new(service_name: String) -> Self {
        Self {
            ready: Arc::new(OnceCell::new()),
            service_name,
        }
    }

    /// State that is ready before serving starts. Tests use this.
    pub fn preloaded(service_name: String, predictor: Arc<Predictor>) -> Self {
        let state = Self::new(service_name);
        let _ = state.ready.set(predictor);
        state
    }

    pub fn predictor(&self) -> Option<&Arc<Predictor>> {
        self.ready.get()
    }
}

/// Build the application router.
///
/// The CORS headers are attached to every response by header-setting layers
/// rather than a preflight-aware CORS layer: browser clients of this service
/// read them on plain GETs too, Origin header or not.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route(
            "/predict",
            post(handlers::predict).options(handlers::preflight),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
        .with_state(state)
}
