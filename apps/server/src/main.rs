// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Visor-IFC Server - element selection and construction status records
//! over HTTP.
//!
//! The client renders the model and reports picks as STEP express ids; the
//! server owns the workflow state, the activity log and the exports.
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/model` - Load an uploaded IFC file (multipart `file`)
//! - `POST /api/v1/model/url` - Load an IFC file from a URL
//! - `POST /api/v1/selection/pick` - Select the element under the pointer
//! - `PUT /api/v1/selection/form` - Update the record form
//! - `POST /api/v1/records` - Register the pending selection
//! - `GET /api/v1/records/export` - CSV download
//! - `GET /api/v1/log` - Activity log panel
//! - `GET /api/v1/tree` - Spatial tree

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use visor_ifc_core::{JsonFileStore, KeyValueStore, PrivateLogFile};

mod config;
mod error;
mod routes;
mod services;
mod types;

use config::Config;
use services::StepViewer;

/// The workflow aggregate behind the HTTP surface.
pub type Visor = visor_ifc_core::AppState<StepViewer>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub visor: Arc<Visor>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();
    Router::new()
        // Root endpoint - API information
        .route("/", get(routes::health::info))
        .route("/api/v1/health", get(routes::health::check))
        // Model session
        .route(
            "/api/v1/model",
            post(routes::model::upload).get(routes::model::status),
        )
        .route("/api/v1/model/url", post(routes::model::load_url))
        // Selection
        .route(
            "/api/v1/selection",
            get(routes::selection::current).delete(routes::selection::cancel),
        )
        .route("/api/v1/selection/pick", post(routes::selection::pick))
        .route("/api/v1/selection/element", post(routes::selection::select))
        .route("/api/v1/selection/focus", post(routes::selection::focus))
        .route("/api/v1/selection/form", put(routes::selection::update_form))
        // Records
        .route(
            "/api/v1/records",
            post(routes::records::register).get(routes::records::list),
        )
        .route("/api/v1/records/export", get(routes::records::export))
        // Activity log
        .route("/api/v1/log", get(routes::log::list))
        .route("/api/v1/log/export", get(routes::log::export))
        .route("/api/v1/tree", get(routes::tree::tree))
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_file_bytes()))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,visor_ifc_server=debug".into()),
        )
        .pretty()
        .init();

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        max_file_size_mb = config.max_file_size_mb,
        log_display_cap = config.log_display_cap,
        log_persisted_cap = config.log_persisted_cap,
        "Starting Visor-IFC Server"
    );

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    let log_config = config.log_config();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(config.storage_file()));
    let log_file = PrivateLogFile::new(
        config.data_dir.join("private"),
        &log_config.log_dir,
        &log_config.log_file_name,
    );
    let viewer = StepViewer::new(
        config.max_file_bytes(),
        Duration::from_secs(config.request_timeout_secs),
    );
    let visor = Arc::new(Visor::new(viewer, &log_config, Some(store), log_file));

    let state = AppState {
        visor: visor.clone(),
        config: Arc::new(config.clone()),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    visor.log.flush().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
