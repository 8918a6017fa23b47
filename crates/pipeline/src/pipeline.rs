//! Query pipeline orchestration
//!
//! Sequences the four stages per incoming question. Transitions are
//! strictly sequential; each stage's output is the next stage's sole
//! input. There is no retry loop and no partial-result emission: a
//! failure in any stage aborts the run, and the session's conversation
//! state is left exactly as it was before the request (only the answer
//! generator mutates it durably, and it rolls back on its own failure).

use crate::context;
use crate::generator::AnswerGenerator;
use crate::retriever::PassageRetriever;
use crate::rewriter::QueryRewriter;
use docsage_common::conversation::ConversationState;
use docsage_common::embeddings::Embedder;
use docsage_common::errors::{AppError, Result};
use docsage_common::index::VectorIndex;
use docsage_common::llm::TextGenerator;
use docsage_common::metrics;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Stages of one pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Rewriting,
    Retrieving,
    Assembling,
    Generating,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Rewriting => "rewriting",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Generating => "generating",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The conversational query pipeline for one knowledge corpus
pub struct QueryPipeline {
    rewriter: QueryRewriter,
    retriever: PassageRetriever,
    generator: AnswerGenerator,
}

impl QueryPipeline {
    /// Build a pipeline from the external capabilities
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            rewriter: QueryRewriter::new(generator.clone()),
            retriever: PassageRetriever::new(embedder, index, top_k),
            generator: AnswerGenerator::new(generator),
        }
    }

    /// Answer one question against the session's conversation state.
    ///
    /// On success the state grows by exactly one (user, model) turn pair;
    /// on any failure the state is unchanged and the error names the
    /// failed stage.
    #[instrument(skip(self, state), fields(history_len = state.len()))]
    pub async fn answer(
        &self,
        question: &str,
        state: &mut ConversationState,
    ) -> Result<String> {
        let start = Instant::now();
        let mut passages_retrieved = 0usize;

        let result = self.run(question, state, &mut passages_retrieved).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => Self::failed_stage(e).as_str(),
        };
        metrics::record_pipeline_run(start.elapsed().as_secs_f64(), outcome, passages_retrieved);

        if let Err(e) = &result {
            warn!(
                stage = %Self::failed_stage(e),
                error = %e,
                "Pipeline run failed"
            );
        }

        result
    }

    async fn run(
        &self,
        question: &str,
        state: &mut ConversationState,
        passages_retrieved: &mut usize,
    ) -> Result<String> {
        let mut stage = PipelineStage::Rewriting;
        debug!(stage = %stage, "Pipeline stage entered");
        let standalone = self.rewriter.rewrite(question, state).await?;

        stage = PipelineStage::Retrieving;
        debug!(stage = %stage, "Pipeline stage entered");
        let passages = self.retriever.retrieve(&standalone).await?;
        *passages_retrieved = passages.len();

        stage = PipelineStage::Assembling;
        debug!(stage = %stage, "Pipeline stage entered");
        let assembled = context::assemble(&passages);

        stage = PipelineStage::Generating;
        debug!(stage = %stage, "Pipeline stage entered");
        let answer = self
            .generator
            .generate(&standalone, &assembled, state)
            .await?;

        stage = PipelineStage::Done;
        debug!(stage = %stage, history_len = state.len(), "Pipeline run complete");
        Ok(answer)
    }

    /// Map an error back to the stage that produced it
    fn failed_stage(error: &AppError) -> PipelineStage {
        match error {
            AppError::RewriteFailed { .. } => PipelineStage::Rewriting,
            AppError::RetrievalFailed { .. } => PipelineStage::Retrieving,
            AppError::GenerationFailed { .. } => PipelineStage::Generating,
            _ => PipelineStage::Idle,
        }
    }
}
