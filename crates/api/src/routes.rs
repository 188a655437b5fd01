use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use blob::{BlobDescriptor, BlobError};
use graph::{DocumentIndexer, GraphError};
use ingest::{ChunkerConfig, IngestPipeline, IngestionResult, UploadedDocument};

use crate::error::ApiError;
use crate::jobs::JobStatus;
use crate::metrics::{MetricsSnapshot, TimedOperation};
use crate::state::AppState;

/// Multipart field carrying the document.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub blob: String,
    pub graph: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    #[serde(default)]
    pub store: bool,
    #[serde(default)]
    pub index: bool,
    pub chunk_size: Option<i64>,
    pub chunk_overlap: Option<i64>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    #[serde(flatten)]
    pub result: IngestionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<BlobDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub results: Vec<serde_json::Value>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let blob_status = if !state.blob_store.is_configured() {
        "unconfigured".to_string()
    } else {
        match tokio::time::timeout(state.config.storage_timeout, state.blob_store.health_check())
            .await
        {
            Ok(Ok(())) => "ok".to_string(),
            Ok(Err(e)) => format!("error: {}", e),
            Err(_) => "error: health check timed out".to_string(),
        }
    };

    let graph_status = if !state.graph.is_configured() {
        "unconfigured".to_string()
    } else {
        match tokio::time::timeout(state.config.storage_timeout, state.graph.ping()).await {
            Ok(Ok(())) => "ok".to_string(),
            Ok(Err(e)) => format!("error: {}", e),
            Err(_) => "error: health check timed out".to_string(),
        }
    };

    let degraded = blob_status.starts_with("error") || graph_status.starts_with("error");
    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        blob: blob_status,
        graph: graph_status,
    })
}

/// Extract and chunk one uploaded document, optionally storing it and
/// queueing a graph indexing job. Any failing step fails the whole request.
pub async fn ingest_document(
    State(state): State<Arc<AppState>>,
    params: Result<Query<IngestParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let outcome = match (params, multipart) {
        (Ok(Query(params)), Ok(multipart)) => ingest_upload(&state, &params, multipart).await,
        (Err(rejection), _) => Err(rejection.into()),
        (_, Err(rejection)) => Err(rejection.into()),
    };
    state.metrics.record_request(outcome.is_ok());
    outcome.map(Json)
}

async fn ingest_upload(
    state: &Arc<AppState>,
    params: &IngestParams,
    multipart: Multipart,
) -> Result<IngestResponse, ApiError> {
    let pipeline = pipeline_for(&state.pipeline, params)?;
    if params.index && !state.indexer.is_configured() {
        return Err(GraphError::Unconfigured.into());
    }

    let document = read_upload(multipart).await?;

    let timer = TimedOperation::start();
    let (document, digest, result) = tokio::task::spawn_blocking(move || {
        let result = pipeline.ingest(&document);
        let digest = ingest::content_digest(document.bytes());
        (document, digest, result)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("ingestion task failed: {}", e)))?;
    let result = result?;
    state.metrics.record_ingest(timer.elapsed(), result.chunks.len());

    let blob = if params.store {
        Some(store_document(state, &document, &digest).await?)
    } else {
        None
    };

    let job_id = params
        .index
        .then(|| spawn_index_job(state, digest.clone(), result.clone()));

    tracing::info!(
        filename = %result.filename,
        byte_size = result.byte_size,
        chunks = result.chunks.len(),
        stored = blob.is_some(),
        job_id = ?job_id,
        "Ingested document"
    );

    Ok(IngestResponse {
        result,
        blob,
        job_id,
    })
}

/// Store the raw upload without extracting it.
pub async fn upload_blob(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BlobDescriptor>), ApiError> {
    let outcome = async {
        let document = read_upload(multipart?).await?;
        let digest = ingest::content_digest(document.bytes());
        store_document(&state, &document, &digest).await
    }
    .await;
    state.metrics.record_request(outcome.is_ok());
    Ok((StatusCode::CREATED, Json(outcome?)))
}

pub async fn fetch_blob(
    State(state): State<Arc<AppState>>,
    blob_name: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(blob_name) = blob_name?;
    let bytes = with_storage_timeout(&state, state.blob_store.fetch(&blob_name)).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

pub async fn delete_blob(
    State(state): State<Arc<AppState>>,
    blob_name: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(blob_name) = blob_name?;
    with_storage_timeout(&state, state.blob_store.delete(&blob_name)).await?;
    tracing::info!(blob_name = %blob_name, "Deleted blob");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn run_query(
    State(state): State<Arc<AppState>>,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = request?;
    let results = state.graph.query(&request.query).await?;
    Ok(Json(QueryResponse { results }))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<JobStatus>, ApiError> {
    let Path(job_id) = job_id?;
    state
        .jobs
        .get(job_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {} not found", job_id)))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Per-request chunking overrides on top of the configured pipeline.
fn pipeline_for(base: &IngestPipeline, params: &IngestParams) -> Result<IngestPipeline, ApiError> {
    if params.chunk_size.is_none() && params.chunk_overlap.is_none() {
        return Ok(base.clone());
    }

    let current = base.chunker_config();
    let config = ChunkerConfig::from_signed(
        params.chunk_size.unwrap_or(current.chunk_size() as i64),
        params.chunk_overlap.unwrap_or(current.chunk_overlap() as i64),
    )?;
    Ok(base.with_chunker_config(config))
}

/// First `file` field, or failing that the first field carrying a filename.
async fn read_upload(mut multipart: Multipart) -> Result<UploadedDocument, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) && field.file_name().is_none() {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        return Ok(UploadedDocument::new(bytes.to_vec(), filename));
    }

    Err(ApiError::BadRequest(format!(
        "multipart body has no '{}' field",
        UPLOAD_FIELD
    )))
}

async fn store_document(
    state: &AppState,
    document: &UploadedDocument,
    digest: &str,
) -> Result<BlobDescriptor, ApiError> {
    let metadata = HashMap::from([("content_sha256".to_string(), digest.to_string())]);

    let timer = TimedOperation::start();
    let descriptor = with_storage_timeout(
        state,
        state
            .blob_store
            .store(document.bytes(), document.filename(), &metadata),
    )
    .await?;
    state
        .metrics
        .record_store(timer.elapsed(), descriptor.size_bytes);

    tracing::info!(
        blob_name = %descriptor.blob_name,
        size_bytes = descriptor.size_bytes,
        "Stored upload"
    );
    Ok(descriptor)
}

async fn with_storage_timeout<T>(
    state: &AppState,
    call: impl Future<Output = blob::Result<T>>,
) -> Result<T, ApiError> {
    let limit = state.config.storage_timeout;
    let outcome = match tokio::time::timeout(limit, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(BlobError::unavailable(format!(
            "storage call timed out after {:?}",
            limit
        ))),
    };

    if let Err(e) = &outcome {
        if e.is_retryable() {
            state.metrics.record_storage_failure();
            tracing::warn!(error = %e, "Blob storage call failed");
        }
    }
    Ok(outcome?)
}

fn spawn_index_job(state: &Arc<AppState>, doc_id: String, result: IngestionResult) -> Uuid {
    let job_id = state.jobs.create();
    state.metrics.record_index_job();

    let state = Arc::clone(state);
    tokio::spawn(async move {
        state.jobs.mark_running(job_id);
        match state.indexer.index_document(&doc_id, &result).await {
            Ok(()) => {
                state
                    .jobs
                    .complete(job_id, format!("Indexed {} chunks", result.chunks.len()));
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, doc_id = %doc_id, error = %e, "Indexing job failed");
                state.jobs.fail(job_id, e.to_string());
            }
        }
    });

    job_id
}
