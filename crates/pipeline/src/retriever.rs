//! Passage retrieval
//!
//! Embeds the standalone question and queries the external similarity
//! index for the top-K nearest passages. The index owns ranking and
//! tie-breaking; the order it returns is preserved as relevance order.

use docsage_common::embeddings::Embedder;
use docsage_common::errors::{AppError, Result};
use docsage_common::index::VectorIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A retrieved passage with its similarity score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedPassage {
    pub text: String,
    pub score: f32,
}

/// Retrieves relevant passages for a standalone question
pub struct PassageRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl PassageRetriever {
    /// Create a retriever returning at most `top_k` passages (minimum 1)
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k: top_k.max(1),
        }
    }

    /// Retrieve passages for `question`, in index-ranked order.
    ///
    /// Zero matches is a legitimate empty result, not an error. No retry
    /// happens at this layer.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedPassage>> {
        let vector = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| AppError::RetrievalFailed {
                message: format!("embedding failed: {}", e),
            })?;

        let matches = self
            .index
            .query(&vector, self.top_k, true)
            .await
            .map_err(|e| AppError::RetrievalFailed {
                message: format!("index query failed: {}", e),
            })?;

        let passages: Vec<RetrievedPassage> = matches
            .into_iter()
            .filter_map(|m| match m.text {
                Some(text) => Some(RetrievedPassage {
                    text,
                    score: m.score,
                }),
                None => {
                    warn!(id = %m.id, "Index match without text metadata, skipping");
                    None
                }
            })
            .collect();

        debug!(count = passages.len(), top_k = self.top_k, "Passages retrieved");
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docsage_common::embeddings::MockEmbedder;
    use docsage_common::index::{IndexEntry, IndexMatch, InMemoryIndex};

    /// Index stub returning a fixed match list, order not score-sorted
    struct ScriptedIndex {
        matches: Vec<IndexMatch>,
    }

    #[async_trait]
    impl VectorIndex for ScriptedIndex {
        async fn query(
            &self,
            _vector: &[f32],
            top_k: usize,
            _include_metadata: bool,
        ) -> docsage_common::errors::Result<Vec<IndexMatch>> {
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }

        async fn upsert(
            &self,
            _entries: &[IndexEntry],
        ) -> docsage_common::errors::Result<()> {
            unimplemented!("not used in tests")
        }
    }

    /// Embedder stub that always fails
    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> docsage_common::errors::Result<Vec<f32>> {
            Err(AppError::upstream("embedding", "connection refused"))
        }

        async fn embed_batch(
            &self,
            _texts: &[String],
        ) -> docsage_common::errors::Result<Vec<Vec<f32>>> {
            Err(AppError::upstream("embedding", "connection refused"))
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            0
        }
    }

    fn index_match(id: &str, score: f32, text: &str) -> IndexMatch {
        IndexMatch {
            id: id.to_string(),
            score,
            text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_index_order_is_preserved_exactly() {
        // Scores deliberately not descending: the retriever must not re-sort.
        let index = ScriptedIndex {
            matches: vec![
                index_match("a", 0.4, "first"),
                index_match("b", 0.9, "second"),
                index_match("c", 0.7, "third"),
            ],
        };
        let retriever =
            PassageRetriever::new(Arc::new(MockEmbedder::new(8)), Arc::new(index), 3);

        let passages = retriever.retrieve("question").await.unwrap();
        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_zero_matches_is_empty_not_error() {
        let index = InMemoryIndex::new();
        let retriever =
            PassageRetriever::new(Arc::new(MockEmbedder::new(8)), Arc::new(index), 2);

        let passages = retriever.retrieve("question").await.unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces_retrieval_failed() {
        let retriever = PassageRetriever::new(
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryIndex::new()),
            2,
        );

        let err = retriever.retrieve("question").await.unwrap_err();
        assert!(matches!(err, AppError::RetrievalFailed { .. }));
    }

    #[tokio::test]
    async fn test_matches_without_text_are_skipped() {
        let index = ScriptedIndex {
            matches: vec![
                index_match("a", 0.9, "kept"),
                IndexMatch {
                    id: "b".to_string(),
                    score: 0.8,
                    text: None,
                },
            ],
        };
        let retriever =
            PassageRetriever::new(Arc::new(MockEmbedder::new(8)), Arc::new(index), 2);

        let passages = retriever.retrieve("question").await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "kept");
    }

    #[tokio::test]
    async fn test_top_k_floor_is_one() {
        let index = ScriptedIndex {
            matches: vec![index_match("a", 0.9, "only")],
        };
        let retriever =
            PassageRetriever::new(Arc::new(MockEmbedder::new(8)), Arc::new(index), 0);

        let passages = retriever.retrieve("question").await.unwrap();
        assert_eq!(passages.len(), 1);
    }
}
