use std::sync::Arc;

use crate::chunker::{Chunker, ChunkerConfig};
use crate::document::{ExtractionResult, IngestionMetadata, IngestionResult, UploadedDocument};
use crate::error::{IngestError, InputError};
use crate::extractor::{DEFAULT_FILENAME, PlaceholderExtractor, TextExtractor};

/// Extract, then chunk. Pure: nothing is stored and nothing is retried.
#[derive(Clone)]
pub struct IngestPipeline {
    extractor: Arc<dyn TextExtractor>,
    chunker: Chunker,
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(Arc::new(PlaceholderExtractor), ChunkerConfig::default())
    }
}

impl IngestPipeline {
    pub fn new(extractor: Arc<dyn TextExtractor>, config: ChunkerConfig) -> Self {
        Self {
            extractor,
            chunker: Chunker::new(config),
        }
    }

    pub fn chunker_config(&self) -> &ChunkerConfig {
        self.chunker.config()
    }

    /// Same extractor, different chunking parameters.
    pub fn with_chunker_config(&self, config: ChunkerConfig) -> Self {
        Self {
            extractor: Arc::clone(&self.extractor),
            chunker: Chunker::new(config),
        }
    }

    pub fn extract(&self, document: &UploadedDocument) -> Result<ExtractionResult, IngestError> {
        if document.is_empty() {
            return Err(InputError::Empty.into());
        }

        let extracted = self
            .extractor
            .extract(document.bytes(), document.filename())?;

        Ok(ExtractionResult {
            filename: document.filename().unwrap_or(DEFAULT_FILENAME).to_string(),
            byte_size: document.byte_size(),
            page_count: extracted.page_count,
            text: extracted.text,
        })
    }

    pub fn ingest(&self, document: &UploadedDocument) -> Result<IngestionResult, IngestError> {
        let extraction = self.extract(document)?;
        let chunks = self.chunker.chunk_text(&extraction.text);
        let config = self.chunker.config();

        tracing::debug!(
            filename = %extraction.filename,
            byte_size = extraction.byte_size,
            chunks = chunks.len(),
            "Document ingested"
        );

        Ok(IngestionResult {
            filename: extraction.filename,
            byte_size: extraction.byte_size,
            page_count: extraction.page_count,
            chunks,
            metadata: IngestionMetadata {
                parser: self.extractor.name().to_string(),
                chunk_size: config.chunk_size(),
                chunk_overlap: config.chunk_overlap(),
            },
        })
    }
}
