use thiserror::Error;

/// Invalid chunking parameters. Fixed by changing the configuration, never by retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid chunking configuration: {0}")]
pub struct ConfigurationError(pub String);

/// Nothing usable was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("uploaded document is empty")]
    Empty,
}

/// Something was sent but its content could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to extract text from '{filename}': {message}")]
pub struct ExtractionError {
    pub filename: String,
    pub message: String,
}

impl ExtractionError {
    pub fn new(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            message: message.into(),
        }
    }
}

/// Every way a single document ingestion can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}
