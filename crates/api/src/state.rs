use anyhow::Context;
use std::sync::Arc;

use blob::BlobStore;
use graph::{DocumentIndexer, GraphClient};
use ingest::{IngestPipeline, PlaceholderExtractor};

use crate::config::ServiceConfig;
use crate::jobs::JobRegistry;
use crate::metrics::Metrics;

pub struct AppState {
    pub config: ServiceConfig,
    pub pipeline: IngestPipeline,
    pub blob_store: Arc<dyn BlobStore>,
    pub graph: GraphClient,
    /// Target of background indexing jobs. The graph client unless replaced.
    pub indexer: Arc<dyn DocumentIndexer>,
    pub jobs: JobRegistry,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: ServiceConfig, blob_store: Arc<dyn BlobStore>, graph: GraphClient) -> Self {
        let pipeline = IngestPipeline::new(Arc::new(PlaceholderExtractor), config.chunking);
        let jobs = JobRegistry::with_retention(config.job_retention);
        Self {
            config,
            pipeline,
            blob_store,
            indexer: Arc::new(graph.clone()),
            graph,
            jobs,
            metrics: Metrics::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: IngestPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn DocumentIndexer>) -> Self {
        self.indexer = indexer;
        self
    }

    /// Connect every backend named in `config`. Unconfigured backends are not an error.
    pub async fn from_config(config: ServiceConfig) -> anyhow::Result<Self> {
        let blob_store = blob::connect(&config.blob, config.storage_timeout)
            .context("Failed to set up blob storage")?;

        let graph = GraphClient::connect(&config.graph)
            .await
            .context("Failed to connect to Neo4j")?;
        if graph.is_configured() {
            graph.indexer()?.init_schema().await?;
        } else {
            tracing::warn!("Neo4j is not configured; query and indexing are disabled");
        }

        Ok(Self::new(config, blob_store, graph))
    }
}
