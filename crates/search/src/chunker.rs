//! Text chunking module
//!
//! Splits corpus documents into overlapping windows for scoring.

use pestwise_common::errors::{AppError, Result};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
    /// Chunks below this size are dropped unless they are the only one
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_chunk_size: 40,
        }
    }
}

/// A text chunk with its position in the source document
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    /// Index among the kept chunks
    pub index: usize,
    /// Byte offsets in the original text
    pub start_pos: usize,
    pub end_pos: usize,
}

/// Reusable splitter for one configuration
pub struct Chunker {
    splitter: TextSplitter<text_splitter::Characters>,
    min_chunk_size: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        let chunk_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)
            .map_err(|e| AppError::Configuration {
                message: format!("invalid chunking configuration: {}", e),
            })?;
        Ok(Self {
            splitter: TextSplitter::new(chunk_config),
            min_chunk_size: config.min_chunk_size,
        })
    }

    /// Split at paragraph and sentence boundaries where possible
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let raw: Vec<(usize, &str)> = self.splitter.chunk_indices(text).collect();
        let only_chunk = raw.len() == 1;

        let result: Vec<TextChunk> = raw
            .into_iter()
            .filter(|(_, chunk)| only_chunk || chunk.chars().count() >= self.min_chunk_size)
            .enumerate()
            .map(|(index, (start_pos, chunk))| TextChunk {
                content: chunk.to_string(),
                index,
                start_pos,
                end_pos: start_pos + chunk.len(),
            })
            .collect();

        debug!(
            input_len = text.len(),
            chunk_count = result.len(),
            "Text chunked"
        );
        result
    }
}

/// One-shot helper
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>> {
    Ok(Chunker::new(config)?.chunk(text))
}
