use crate::error::ExtractionError;

pub const DEFAULT_FILENAME: &str = "uploaded.pdf";

/// Plain text pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// `None` when the extractor cannot tell; that is a final answer, not a pending one.
    pub page_count: Option<u32>,
}

/// Turns raw document bytes into plain text.
///
/// Implementations must not fail on well-formed, non-empty input and must
/// report unreadable content as [`ExtractionError`].
pub trait TextExtractor: Send + Sync {
    /// Identifier recorded in ingestion metadata.
    fn name(&self) -> &str;

    fn extract(&self, bytes: &[u8], filename: Option<&str>)
    -> Result<ExtractedText, ExtractionError>;
}

/// Stand-in until a real PDF parser is wired in. Derives text from the
/// filename only and never inspects the bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExtractor;

impl TextExtractor for PlaceholderExtractor {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn extract(
        &self,
        _bytes: &[u8],
        filename: Option<&str>,
    ) -> Result<ExtractedText, ExtractionError> {
        Ok(ExtractedText {
            text: format!(
                "Placeholder extracted content from {}",
                filename.unwrap_or(DEFAULT_FILENAME)
            ),
            page_count: None,
        })
    }
}
