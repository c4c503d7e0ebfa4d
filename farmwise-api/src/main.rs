//! FarmWise Plant Disease API - entry point
//!
//! Binds the HTTP listener first so health probes answer immediately, then
//! provisions assets and loads the model in a background task. `/predict`
//! returns 503 until that task sets the shared predictor cell.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farmwise_api::config::Args;
use farmwise_api::{build_router, AppState};
use farmwise_core::{AssetStore, ModelBackend, Predictor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "farmwise_api=debug,farmwise_core=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting FarmWise Plant Disease API v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        "Backend: {}, assets dir: {}, confidence threshold: {}",
        args.backend,
        args.assets_dir.display(),
        args.confidence_threshold
    );

    let service_name = format!("FarmWise Plant Disease API ({})", args.backend);
    let state = AppState::new(service_name);

    // Bind before the heavyweight model work; /predict answers 503 until
    // the init task finishes.
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    let init_state = state.clone();
    let store = AssetStore::new(args.assets_dir.clone());
    let backend = args.backend;
    let threshold = args.confidence_threshold;
    tokio::spawn(async move {
        if let Err(e) = initialize(&init_state, store, backend, threshold).await {
            error!("startup failed: {e:#}");
            std::process::exit(1);
        }
    });

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

/// Provision assets, load the predictor, and publish it to the state cell.
async fn initialize(
    state: &AppState,
    store: AssetStore,
    backend: ModelBackend,
    threshold: f64,
) -> Result<()> {
    store.provision(backend).await?;
    info!("✓ Assets provisioned in {}", store.dir().display());
    let predictor =
        tokio::task::spawn_blocking(move || Predictor::load(&store, backend, threshold))
            .await
            .context("predictor load task panicked")??;
    let class_count = predictor.class_count();
    let input_shape = predictor.input_shape();
    state
        .ready
        .set(Arc::new(predictor))
        .map_err(|_| anyhow::anyhow!("predictor already initialized"))?;
    info!("✓ Service ready: {class_count} classes, input {input_shape}");
    Ok(())
}
