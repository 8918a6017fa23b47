//! Ingestion processor
//!
//! Core logic for one document: PDF extraction, chunking, batch embedding,
//! and concurrent upsert into the similarity index.

use crate::chunker::{chunk_text, Passage};
use crate::errors::IngestionError;
use crate::pdf::extract_text;
use docsage_common::config::IngestionConfig;
use docsage_common::embeddings::Embedder;
use docsage_common::index::{IndexEntry, VectorIndex};
use docsage_common::metrics;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Entries per upsert request
const UPSERT_BATCH_SIZE: usize = 100;

/// Summary of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub document: String,
    pub passages_indexed: usize,
    pub elapsed_secs: f64,
}

/// Ingestion processor
pub struct IngestionProcessor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: IngestionConfig,
}

impl IngestionProcessor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Ingest one PDF document into the similarity index
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn ingest_document(&self, path: &Path) -> Result<IngestionReport, IngestionError> {
        let start = Instant::now();

        if !path.exists() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        info!("Extracting text from PDF...");
        let text = extract_text(path)?;

        info!("Chunking text...");
        let passages = chunk_text(&text, &self.config)?;
        if passages.is_empty() {
            return Err(IngestionError::EmptyDocument(path.display().to_string()));
        }
        info!(
            passage_count = passages.len(),
            token_estimate = passages.iter().map(|p| p.token_estimate).sum::<usize>(),
            "Text chunked successfully"
        );

        info!("Embedding passages...");
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embed_start = Instant::now();
        let vectors = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => {
                metrics::record_embedding(
                    embed_start.elapsed().as_secs_f64(),
                    self.embedder.model_name(),
                    texts.len(),
                    true,
                );
                vectors
            }
            Err(e) => {
                metrics::record_embedding(
                    embed_start.elapsed().as_secs_f64(),
                    self.embedder.model_name(),
                    texts.len(),
                    false,
                );
                return Err(IngestionError::Embedding(e.to_string()));
            }
        };

        let document = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        let entries: Vec<IndexEntry> = passages
            .iter()
            .zip(vectors)
            .map(|(passage, values)| IndexEntry {
                id: entry_id(&document, passage),
                values,
                text: passage.text.clone(),
            })
            .collect();

        info!(
            batches = entries.len().div_ceil(UPSERT_BATCH_SIZE),
            max_concurrency = self.config.max_concurrency,
            "Upserting into similarity index..."
        );
        let batches: Vec<Vec<IndexEntry>> = entries
            .chunks(UPSERT_BATCH_SIZE)
            .map(|batch| batch.to_vec())
            .collect();

        stream::iter(batches)
            .map(|batch| {
                let index = self.index.clone();
                async move { index.upsert(&batch).await }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .map_err(|e| IngestionError::Index(e.to_string()))
            .try_collect::<Vec<()>>()
            .await?;

        let elapsed_secs = start.elapsed().as_secs_f64();
        metrics::record_ingestion(elapsed_secs, entries.len());

        info!(
            document = %document,
            passages = entries.len(),
            elapsed_secs = elapsed_secs,
            "Document ingested"
        );

        Ok(IngestionReport {
            document,
            passages_indexed: entries.len(),
            elapsed_secs,
        })
    }
}

/// Stable id for one passage of one document
fn entry_id(document: &str, passage: &Passage) -> String {
    format!("{}-{}", document, passage.index)
}
