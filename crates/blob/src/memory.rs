use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

use crate::error::{BlobError, Result};
use crate::key::{build_blob_name, validate_blob_name};
use crate::{BlobDescriptor, BlobStore, ensure_not_empty};

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

/// Process-local blob store. Contents are lost on restart.
pub struct MemoryBlobStore {
    container: String,
    blobs: DashMap<String, StoredBlob>,
}

impl MemoryBlobStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blobs: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn get(&self, blob_name: &str) -> Option<StoredBlob> {
        self.blobs.get(blob_name).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<BlobDescriptor> {
        ensure_not_empty(bytes)?;

        let blob_name = build_blob_name(filename);
        self.blobs.insert(
            blob_name.clone(),
            StoredBlob {
                bytes: bytes.to_vec(),
                metadata: metadata.clone(),
            },
        );

        Ok(BlobDescriptor {
            container: self.container.clone(),
            blob_url: format!("memory://{}/{}", self.container, blob_name),
            blob_name,
            size_bytes: bytes.len(),
        })
    }

    async fn fetch(&self, blob_name: &str) -> Result<Vec<u8>> {
        validate_blob_name(blob_name)?;
        self.get(blob_name)
            .map(|blob| blob.bytes)
            .ok_or_else(|| BlobError::NotFound(blob_name.to_string()))
    }

    async fn delete(&self, blob_name: &str) -> Result<()> {
        validate_blob_name(blob_name)?;
        self.blobs
            .remove(blob_name)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(blob_name.to_string()))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
