//! Similarity index abstraction
//!
//! Provides a unified interface to the external vector index that stores
//! passage embeddings:
//! - Pinecone (data-plane REST API)
//! - In-memory cosine store (tests and development)
//!
//! The index owns similarity ranking and tie-breaking; callers treat the
//! returned order as relevance order.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A match returned from an index query, in index-ranked order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    /// Passage text carried as metadata; present when the query requested
    /// metadata and the entry was upserted with text.
    pub text: Option<String>,
}

/// An entry to upsert into the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
}

/// Trait for the external similarity index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Query the nearest `top_k` entries for a vector
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>>;

    /// Upsert entries into the index
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()>;
}

/// Pinecone index client (data-plane REST)
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    host: String,
    namespace: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PineconeQueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct PineconeQueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<PineconeMetadata>,
}

#[derive(Serialize, Deserialize)]
struct PineconeMetadata {
    text: String,
}

#[derive(Serialize)]
struct PineconeUpsertRequest<'a> {
    vectors: Vec<PineconeVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    metadata: PineconeMetadata,
}

impl PineconeIndex {
    /// Create a new Pinecone client for one index host
    pub fn new(
        api_key: String,
        host: String,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            host: host.trim_end_matches('/').to_string(),
            namespace,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.host, path);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::upstream("pinecone", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "pinecone",
                format!("API error {}: {}", status, body),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>> {
        let request = PineconeQueryRequest {
            vector,
            top_k,
            include_metadata,
            namespace: self.namespace.as_deref(),
        };

        let response = self.post_json("/query", &request).await?;

        let result: PineconeQueryResponse = response.json().await.map_err(|e| {
            AppError::upstream("pinecone", format!("Failed to parse response: {}", e))
        })?;

        // Order from the index is relevance order; preserve it exactly.
        Ok(result
            .matches
            .into_iter()
            .map(|m| IndexMatch {
                id: m.id,
                score: m.score,
                text: m.metadata.map(|meta| meta.text),
            })
            .collect())
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let request = PineconeUpsertRequest {
            vectors: entries
                .iter()
                .map(|e| PineconeVector {
                    id: e.id.clone(),
                    values: e.values.clone(),
                    metadata: PineconeMetadata {
                        text: e.text.clone(),
                    },
                })
                .collect(),
            namespace: self.namespace.as_deref(),
        };

        self.post_json("/vectors/upsert", &request).await?;
        Ok(())
    }
}

/// In-memory index for tests and development
///
/// Ranks by cosine similarity. Not intended for production corpora.
#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>> {
        let entries = self.entries.read().unwrap();

        let mut scored: Vec<(f32, &IndexEntry)> = entries
            .iter()
            .map(|e| (Self::cosine_similarity(vector, &e.values), e))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, e)| IndexMatch {
                id: e.id.clone(),
                score,
                text: include_metadata.then(|| e.text.clone()),
            })
            .collect())
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut store = self.entries.write().unwrap();
        for entry in entries {
            match store.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => store.push(entry.clone()),
            }
        }
        Ok(())
    }
}

/// Create an index client based on configuration
pub fn create_index(
    provider: &str,
    api_key: Option<String>,
    host: Option<String>,
    namespace: Option<String>,
    timeout: Duration,
) -> Result<Arc<dyn VectorIndex>> {
    match provider {
        "pinecone" => {
            let key = api_key.ok_or_else(|| AppError::Configuration {
                message: "Pinecone API key required".to_string(),
            })?;
            let host = host.ok_or_else(|| AppError::Configuration {
                message: "Pinecone index host required".to_string(),
            })?;
            Ok(Arc::new(PineconeIndex::new(key, host, namespace, timeout)?))
        }
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        _ => {
            tracing::warn!(provider = provider, "Unknown index provider, using in-memory");
            Ok(Arc::new(InMemoryIndex::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, values: Vec<f32>, text: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            values,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_ranks_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                entry("a", vec![1.0, 0.0], "aligned"),
                entry("b", vec![0.0, 1.0], "orthogonal"),
                entry("c", vec![0.7, 0.7], "diagonal"),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 2, true).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[0].text.as_deref(), Some("aligned"));
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn test_in_memory_empty_query() {
        let index = InMemoryIndex::new();
        let matches = index.query(&[1.0, 0.0], 5, true).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_id() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[entry("a", vec![1.0], "old")])
            .await
            .unwrap();
        index
            .upsert(&[entry("a", vec![1.0], "new")])
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        let matches = index.query(&[1.0], 1, true).await.unwrap();
        assert_eq!(matches[0].text.as_deref(), Some("new"));
    }

    #[test]
    fn test_query_request_shape() {
        let request = PineconeQueryRequest {
            vector: &[0.1, 0.2],
            top_k: 2,
            include_metadata: true,
            namespace: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topK"], 2);
        assert_eq!(json["includeMetadata"], true);
        assert!(json.get("namespace").is_none());
    }
}
