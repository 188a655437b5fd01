use serde::{Deserialize, Serialize};

/// Raw upload as received. Never persisted itself.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    bytes: Vec<u8>,
    filename: Option<String>,
}

impl UploadedDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.filter(|name| !name.is_empty()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub filename: String,
    pub byte_size: usize,
    pub page_count: Option<u32>,
    pub text: String,
}

/// Which extractor and chunking parameters produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionMetadata {
    pub parser: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Terminal artifact of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub filename: String,
    pub byte_size: usize,
    pub page_count: Option<u32>,
    /// Document order.
    pub chunks: Vec<String>,
    pub metadata: IngestionMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filename_is_treated_as_missing() {
        let doc = UploadedDocument::new(b"abc".to_vec(), Some(String::new()));
        assert_eq!(doc.filename(), None);
        assert_eq!(doc.byte_size(), 3);

        let doc = UploadedDocument::new(b"abc".to_vec(), Some("   ".to_string()));
        assert_eq!(doc.filename(), Some("   "));
    }

    #[test]
    fn test_result_serializes_null_page_count() {
        let result = IngestionResult {
            filename: "a.pdf".to_string(),
            byte_size: 5,
            page_count: None,
            chunks: vec!["one".to_string()],
            metadata: IngestionMetadata {
                parser: "placeholder".to_string(),
                chunk_size: 800,
                chunk_overlap: 100,
            },
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["page_count"], serde_json::Value::Null);
        assert_eq!(json["metadata"]["chunk_size"], 800);
        assert_eq!(json["chunks"][0], "one");
    }
}
