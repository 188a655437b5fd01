pub mod chunk_graph;

pub use chunk_graph::ChunkGraphIndexer;

use async_trait::async_trait;
use neo4rs::{Graph, Query};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// No graph database was configured. Not a failure of any query.
    #[error("graph database is not configured")]
    Unconfigured,

    #[error("graph connection failed: {0}")]
    Connection(String),

    #[error("graph query failed: {0}")]
    Query(String),
}

/// Writes ingestion results into the graph. Implemented by `GraphClient`.
#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    async fn index_document(
        &self,
        doc_id: &str,
        result: &ingest::IngestionResult,
    ) -> Result<(), GraphError>;

    fn is_configured(&self) -> bool;
}

#[derive(Clone, PartialEq, Eq)]
pub enum GraphConfig {
    Unconfigured,
    Neo4j {
        uri: String,
        user: String,
        password: String,
    },
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconfigured => f.write_str("Unconfigured"),
            Self::Neo4j { uri, user, .. } => f
                .debug_struct("Neo4j")
                .field("uri", uri)
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Query boundary of the graph layer, with an explicit unconfigured state.
#[derive(Clone)]
pub struct GraphClient {
    graph: Option<Graph>,
}

impl GraphClient {
    pub fn unconfigured() -> Self {
        Self { graph: None }
    }

    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        match config {
            GraphConfig::Unconfigured => Ok(Self::unconfigured()),
            GraphConfig::Neo4j {
                uri,
                user,
                password,
            } => {
                let graph = Graph::new(uri.as_str(), user.as_str(), password.as_str())
                    .await
                    .map_err(|e| GraphError::Connection(e.to_string()))?;
                tracing::info!(uri = %uri, "Connected to Neo4j");
                Ok(Self { graph: Some(graph) })
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.graph.is_some()
    }

    fn graph(&self) -> Result<&Graph, GraphError> {
        self.graph.as_ref().ok_or(GraphError::Unconfigured)
    }

    /// Run a read query and return each row as a JSON object keyed by column.
    pub async fn query(&self, text: &str) -> Result<Vec<serde_json::Value>, GraphError> {
        let graph = self.graph()?;
        if text.trim().is_empty() {
            return Err(GraphError::Query("query is empty".to_string()));
        }

        let mut stream = graph
            .execute(Query::new(text.to_string()))
            .await
            .map_err(|e| GraphError::Query(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphError::Query(e.to_string()))?
        {
            let value = row
                .to::<serde_json::Value>()
                .map_err(|e| GraphError::Query(format!("Failed to decode row: {}", e)))?;
            rows.push(value);
        }
        Ok(rows)
    }

    pub async fn ping(&self) -> Result<(), GraphError> {
        self.graph()?
            .run(neo4rs::query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))
    }

    pub fn indexer(&self) -> Result<ChunkGraphIndexer, GraphError> {
        Ok(ChunkGraphIndexer::new(self.graph()?.clone()))
    }

}

#[async_trait]
impl DocumentIndexer for GraphClient {
    async fn index_document(
        &self,
        doc_id: &str,
        result: &ingest::IngestionResult,
    ) -> Result<(), GraphError> {
        self.indexer()?.index_document(doc_id, result).await
    }

    fn is_configured(&self) -> bool {
        GraphClient::is_configured(self)
    }
}
