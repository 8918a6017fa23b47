//! Text chunking module
//!
//! Splits extracted document text into overlapping passages for embedding.

use crate::errors::IngestionError;
use docsage_common::config::IngestionConfig;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// A passage of source text ready for embedding
#[derive(Debug, Clone)]
pub struct Passage {
    /// The passage content
    pub text: String,
    /// Index of this passage in the document
    pub index: usize,
    /// Approximate token count (~4 chars per token)
    pub token_estimate: usize,
}

/// Split text into overlapping passages.
///
/// Passages shorter than the configured minimum are dropped; indices are
/// assigned after filtering so they stay contiguous.
pub fn chunk_text(text: &str, config: &IngestionConfig) -> Result<Vec<Passage>, IngestionError> {
    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| IngestionError::Chunking(e.to_string()))?;
    let splitter = TextSplitter::new(chunk_config);

    let passages: Vec<Passage> = splitter
        .chunks(text)
        .filter(|chunk| chunk.len() >= config.min_chunk_size)
        .enumerate()
        .map(|(index, chunk)| Passage {
            text: chunk.to_string(),
            index,
            token_estimate: chunk.len() / 4,
        })
        .collect();

    debug!(
        input_len = text.len(),
        passage_count = passages.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Text chunked"
    );

    Ok(passages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> IngestionConfig {
        IngestionConfig {
            document_path: None,
            chunk_size,
            chunk_overlap,
            min_chunk_size,
            max_concurrency: 1,
        }
    }

    #[test]
    fn test_basic_chunking() {
        let text = "This is a sentence about data structures. ".repeat(100);
        let passages = chunk_text(&text, &config(200, 50, 50)).unwrap();

        assert!(!passages.is_empty());
        for passage in &passages {
            assert!(passage.text.len() >= 50);
            assert!(passage.text.len() <= 200);
        }
    }

    #[test]
    fn test_indices_are_contiguous() {
        let text = "Sentence one. Sentence two. Sentence three. Sentence four.".repeat(10);
        let passages = chunk_text(&text, &config(100, 20, 10)).unwrap();

        for (i, passage) in passages.iter().enumerate() {
            assert_eq!(passage.index, i);
        }
    }

    #[test]
    fn test_empty_text_yields_no_passages() {
        let passages = chunk_text("", &config(1000, 200, 100)).unwrap();
        assert!(passages.is_empty());
    }

    #[test]
    fn test_overlap_larger_than_size_is_rejected() {
        let err = chunk_text("some text", &config(100, 200, 10)).unwrap_err();
        assert!(matches!(err, IngestionError::Chunking(_)));
    }
}
