pub mod chunker;
pub mod document;
pub mod error;
pub mod extractor;
pub mod pipeline;

pub use chunker::{Chunker, ChunkerConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, chunk};
pub use document::{ExtractionResult, IngestionMetadata, IngestionResult, UploadedDocument};
pub use error::{ConfigurationError, ExtractionError, IngestError, InputError};
pub use extractor::{ExtractedText, PlaceholderExtractor, TextExtractor};
pub use pipeline::IngestPipeline;

use sha2::{Digest, Sha256};

/// Hex SHA-256 of the raw document bytes. Stable across uploads of the same content.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Ingest with the default extractor and chunking parameters (800 / 100).
pub fn ingest(bytes: &[u8], filename: Option<&str>) -> Result<IngestionResult, IngestError> {
    let document = UploadedDocument::new(bytes.to_vec(), filename.map(str::to_string));
    IngestPipeline::default().ingest(&document)
}
