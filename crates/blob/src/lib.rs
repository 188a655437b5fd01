//! Durable storage for raw uploaded documents.

pub mod azure;
pub mod config;
pub mod error;
pub mod key;
pub mod memory;

pub use azure::AzureBlobStore;
pub use config::{AzureBlobConfig, AzureCredential, BlobStoreConfig, DEFAULT_CONTAINER};
pub use error::{BlobError, Result};
pub use key::{build_blob_name, validate_blob_name};
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Where a stored upload lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub container: String,
    pub blob_name: String,
    pub blob_url: String,
    pub size_bytes: usize,
}

/// Storage for raw document bytes.
///
/// `store` is not idempotent: every call writes a new object under a freshly
/// generated name. Callers that need dedupe should key on a content hash.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<BlobDescriptor>;

    async fn fetch(&self, blob_name: &str) -> Result<Vec<u8>>;

    async fn delete(&self, blob_name: &str) -> Result<()>;

    async fn health_check(&self) -> Result<()>;

    fn name(&self) -> &str;

    fn is_configured(&self) -> bool {
        true
    }
}

pub(crate) fn ensure_not_empty(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(BlobError::InvalidInput("document bytes cannot be empty".to_string()));
    }
    Ok(())
}

/// Stand-in used when no storage settings exist. Fails fast on every call.
#[derive(Debug, Default)]
pub struct UnconfiguredBlobStore;

impl UnconfiguredBlobStore {
    fn error() -> BlobError {
        BlobError::unavailable("Azure Blob Storage is not configured")
    }
}

#[async_trait]
impl BlobStore for UnconfiguredBlobStore {
    async fn store(
        &self,
        bytes: &[u8],
        _filename: Option<&str>,
        _metadata: &HashMap<String, String>,
    ) -> Result<BlobDescriptor> {
        ensure_not_empty(bytes)?;
        Err(Self::error())
    }

    async fn fetch(&self, _blob_name: &str) -> Result<Vec<u8>> {
        Err(Self::error())
    }

    async fn delete(&self, _blob_name: &str) -> Result<()> {
        Err(Self::error())
    }

    async fn health_check(&self) -> Result<()> {
        Err(Self::error())
    }

    fn name(&self) -> &str {
        "unconfigured"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Build the store described by `config`. `timeout` bounds every network call.
pub fn connect(config: &BlobStoreConfig, timeout: Duration) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config {
        BlobStoreConfig::Unconfigured => {
            tracing::warn!("Blob storage is not configured; uploads will be rejected");
            Arc::new(UnconfiguredBlobStore)
        }
        BlobStoreConfig::InMemory { container } => Arc::new(MemoryBlobStore::new(container.clone())),
        BlobStoreConfig::Azure(azure) => {
            tracing::info!(
                endpoint = %azure.endpoint,
                container = %azure.container,
                "Using Azure Blob Storage"
            );
            Arc::new(AzureBlobStore::new(azure.clone(), timeout)?)
        }
    };
    Ok(store)
}
