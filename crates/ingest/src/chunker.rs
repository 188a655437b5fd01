use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Window parameters, in characters. Always satisfies `chunk_size > chunk_overlap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkerConfig")]
pub struct ChunkerConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

#[derive(Deserialize)]
struct RawChunkerConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TryFrom<RawChunkerConfig> for ChunkerConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawChunkerConfig) -> Result<Self, Self::Error> {
        Self::new(raw.chunk_size, raw.chunk_overlap)
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigurationError> {
        if chunk_size == 0 {
            return Err(ConfigurationError(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigurationError(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Validate parameters that arrive as signed integers (env vars, query strings).
    pub fn from_signed(chunk_size: i64, chunk_overlap: i64) -> Result<Self, ConfigurationError> {
        if chunk_size <= 0 {
            return Err(ConfigurationError(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap < 0 {
            return Err(ConfigurationError(
                "chunk_overlap cannot be negative".to_string(),
            ));
        }
        let size = usize::try_from(chunk_size)
            .map_err(|_| ConfigurationError(format!("chunk_size {} is too large", chunk_size)))?;
        let overlap = usize::try_from(chunk_overlap).map_err(|_| {
            ConfigurationError(format!("chunk_overlap {} is too large", chunk_overlap))
        })?;
        Self::new(size, overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance between consecutive window starts.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Fixed-stride window chunker.
///
/// Windows of `chunk_size` characters start every `chunk_size - chunk_overlap`
/// characters. Each window is trimmed and dropped if nothing but whitespace
/// remains, so the tail of a document can yield fewer chunks than windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut chunks = Vec::new();
        for start in (0..char_len).step_by(self.config.step()) {
            let end = start.saturating_add(self.config.chunk_size).min(char_len);
            let window = text[boundaries[start]..boundaries[end]].trim_matches(is_strip_whitespace);
            if !window.is_empty() {
                chunks.push(window.to_string());
            }
        }

        chunks
    }
}

/// Unicode whitespace plus the ASCII information separators U+001C..=U+001F.
fn is_strip_whitespace(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Split `text` into trimmed, non-empty, overlapping windows.
pub fn chunk(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, ConfigurationError> {
    let config = ChunkerConfig::new(chunk_size, chunk_overlap)?;
    Ok(Chunker::new(config).chunk_text(text))
}
