//! DocSage Ingestion Job
//!
//! One-shot batch job that makes a source document searchable:
//! 1. Extracts text from the PDF
//! 2. Splits it into overlapping passages
//! 3. Embeds each passage
//! 4. Upserts passage vectors into the similarity index
//!
//! The query pipeline interacts with this job only through the shared
//! index contents.

mod chunker;
mod errors;
mod pdf;
mod processor;

use docsage_common::{
    config::AppConfig, embeddings::create_embedder, index::create_index, metrics, VERSION,
};
use errors::IngestionError;
use processor::IngestionProcessor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting DocSage Ingestion Job v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    metrics::register_metrics();

    // Document path: CLI argument wins over configuration
    let document_path = std::env::args()
        .nth(1)
        .or_else(|| config.ingestion.document_path.clone())
        .map(PathBuf::from)
        .ok_or_else(|| {
            IngestionError::Config(
                "No document path given (argument or ingestion.document_path)".to_string(),
            )
        })?;

    // Wire up the external capabilities
    let embedder = create_embedder(
        &config.embedding.provider,
        config.embedding.api_key.clone(),
        Some(config.embedding.model.clone()),
        config.embedding.api_base.clone(),
        Duration::from_secs(config.embedding.timeout_secs),
    )?;
    let index = create_index(
        &config.index.provider,
        config.index.api_key.clone(),
        config.index.host.clone(),
        config.index.namespace.clone(),
        Duration::from_secs(config.index.timeout_secs),
    )?;

    let processor = IngestionProcessor::new(embedder, index, config.ingestion.clone());

    let report = processor.ingest_document(&document_path).await?;

    info!(
        document = %report.document,
        passages = report.passages_indexed,
        elapsed_secs = report.elapsed_secs,
        "Ingestion complete"
    );

    Ok(())
}
