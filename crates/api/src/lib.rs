//! HTTP surface for document ingestion: upload, chunk, store and index PDFs.

pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.frontend_origin.as_ref());
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/ingest", post(routes::ingest_document))
        .route("/blobs", post(routes::upload_blob))
        .route(
            "/blobs/*blob_name",
            get(routes::fetch_blob).delete(routes::delete_blob),
        )
        .route("/query", post(routes::run_query))
        .route("/jobs/:job_id", get(routes::get_job))
        .route("/stats", get(routes::get_stats))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: Option<&HeaderValue>) -> CorsLayer {
    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.clone())
            .allow_credentials(true)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request()),
        None => CorsLayer::permissive(),
    }
}
