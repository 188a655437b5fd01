use axum::{
    Json,
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use blob::BlobError;
use graph::GraphError;
use ingest::{ConfigurationError, IngestError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Request could not be parsed by an extractor; keeps the extractor's status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ConfigurationError> for ApiError {
    fn from(err: ConfigurationError) -> Self {
        Self::Ingest(err.into())
    }
}

macro_rules! from_rejection {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self::Rejected {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )*
    };
}

from_rejection!(QueryRejection, JsonRejection, PathRejection, MultipartRejection);

impl ApiError {
    /// Status code and the stable `error.type` string clients switch on.
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Ingest(IngestError::Configuration(_)) => {
                (StatusCode::BAD_REQUEST, "configuration_error")
            }
            Self::Ingest(IngestError::Input(_)) => (StatusCode::BAD_REQUEST, "input_error"),
            Self::Ingest(IngestError::Extraction(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "extraction_error")
            }
            Self::Blob(BlobError::InvalidInput(_)) => (StatusCode::BAD_REQUEST, "input_error"),
            Self::Blob(BlobError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Blob(BlobError::Unavailable(_) | BlobError::Config(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            Self::Graph(GraphError::Unconfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "graph_unconfigured")
            }
            Self::Graph(GraphError::Connection(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "graph_unavailable")
            }
            Self::Graph(GraphError::Query(_)) => (StatusCode::BAD_GATEWAY, "graph_query_error"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "input_error"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Rejected { status, .. } => (*status, "input_error"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        if status.is_server_error() {
            tracing::error!(error = %self, kind, "Request failed");
        } else {
            tracing::debug!(error = %self, kind, "Request rejected");
        }

        let body = Json(json!({
            "error": {
                "type": kind,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::InputError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                ConfigurationError("chunk_size must be > 0".into()).into(),
                StatusCode::BAD_REQUEST,
                "configuration_error",
            ),
            (
                IngestError::from(InputError::Empty).into(),
                StatusCode::BAD_REQUEST,
                "input_error",
            ),
            (
                IngestError::from(ingest::ExtractionError::new("a.pdf", "garbled")).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_error",
            ),
            (
                BlobError::unavailable("down").into(),
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_unavailable",
            ),
            (
                BlobError::NotFound("x".into()).into(),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                GraphError::Unconfigured.into(),
                StatusCode::SERVICE_UNAVAILABLE,
                "graph_unconfigured",
            ),
            (
                GraphError::Query("syntax".into()).into(),
                StatusCode::BAD_GATEWAY,
                "graph_query_error",
            ),
        ];

        for (err, status, kind) in cases {
            assert_eq!(err.status_and_kind(), (status, kind), "{}", err);
        }
    }

    #[test]
    fn test_response_status() {
        let response = ApiError::NotFound("job".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
