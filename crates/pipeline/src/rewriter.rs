//! Query rewriting
//!
//! Turns a possibly context-dependent follow-up question into a standalone
//! question the retriever can embed without any chat history.
//!
//! The rewrite is a side query, not a conversational turn: the incoming
//! question is appended to the state only so the generation call sees the
//! full history, and is removed again before this function returns,
//! whether the call succeeded or not.

use docsage_common::conversation::{ConversationState, Turn};
use docsage_common::errors::{AppError, Result};
use docsage_common::llm::TextGenerator;
use std::sync::Arc;
use tracing::{debug, instrument};

/// System instruction for the rewrite call
const REWRITE_INSTRUCTION: &str = "You are a query rewriting expert. Based on the provided chat \
history, rephrase the follow-up user question into a complete, standalone question that can be \
understood without the chat history. Only output the rewritten question and nothing else.";

/// Rewrites follow-up questions into standalone questions
pub struct QueryRewriter {
    generator: Arc<dyn TextGenerator>,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Rewrite `question` using the conversation history in `state`.
    ///
    /// The transient turn appended here never survives this call. An empty
    /// rewrite from the model is rejected rather than passed downstream.
    #[instrument(skip(self, state), fields(history_len = state.len()))]
    pub async fn rewrite(
        &self,
        question: &str,
        state: &mut ConversationState,
    ) -> Result<String> {
        state.append(Turn::user(question));

        let outcome = self
            .generator
            .generate(state.snapshot(), REWRITE_INSTRUCTION)
            .await;

        // The transient turn is removed on every path out of this function.
        state.remove_last()?;

        let rewritten = outcome.map_err(|e| AppError::RewriteFailed {
            message: e.to_string(),
        })?;

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Err(AppError::RewriteFailed {
                message: "model returned an empty rewrite".to_string(),
            });
        }

        debug!(standalone = %rewritten, "Question rewritten");
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_common::llm::MockGenerator;

    fn rewriter_with(generator: &MockGenerator) -> QueryRewriter {
        QueryRewriter::new(Arc::new(generator.clone()))
    }

    #[tokio::test]
    async fn test_rewrite_returns_model_output() {
        let generator = MockGenerator::new();
        generator.push_response("What is the height of a binary tree?");
        let rewriter = rewriter_with(&generator);

        let mut state = ConversationState::new();
        state.append(Turn::user("tell me about binary trees"));
        state.append(Turn::model("a binary tree is..."));

        let standalone = rewriter
            .rewrite("what about its height?", &mut state)
            .await
            .unwrap();

        assert_eq!(standalone, "What is the height of a binary tree?");
    }

    #[tokio::test]
    async fn test_transient_turn_never_persists_on_success() {
        let generator = MockGenerator::new();
        generator.push_response("standalone");
        let rewriter = rewriter_with(&generator);

        let mut state = ConversationState::new();
        state.append(Turn::user("earlier question"));
        let before = state.clone();

        rewriter.rewrite("follow up", &mut state).await.unwrap();
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_transient_turn_never_persists_on_failure() {
        let generator = MockGenerator::new();
        generator.push_failure("timeout");
        let rewriter = rewriter_with(&generator);

        let mut state = ConversationState::new();
        state.append(Turn::user("earlier question"));
        let before = state.clone();

        let err = rewriter.rewrite("follow up", &mut state).await.unwrap_err();
        assert!(matches!(err, AppError::RewriteFailed { .. }));
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_repeated_rewrites_leave_state_length_unchanged() {
        let generator = MockGenerator::new();
        let rewriter = rewriter_with(&generator);

        let mut state = ConversationState::new();
        state.append(Turn::user("q"));
        state.append(Turn::model("a"));

        for _ in 0..5 {
            // Exhausted script echoes the question; outcome is irrelevant here.
            let _ = rewriter.rewrite("again?", &mut state).await;
            assert_eq!(state.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_generation_sees_question_as_last_turn() {
        let generator = MockGenerator::new();
        generator.push_response("standalone");
        let rewriter = rewriter_with(&generator);

        let mut state = ConversationState::new();
        state.append(Turn::user("first"));
        state.append(Turn::model("answer"));

        rewriter.rewrite("follow up", &mut state).await.unwrap();

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].context_len, 3);
        assert_eq!(calls[0].last_turn_text.as_deref(), Some("follow up"));
    }

    #[tokio::test]
    async fn test_empty_rewrite_is_rejected() {
        let generator = MockGenerator::new();
        generator.push_response("   \n");
        let rewriter = rewriter_with(&generator);

        let mut state = ConversationState::new();
        let err = rewriter.rewrite("question", &mut state).await.unwrap_err();
        assert!(matches!(err, AppError::RewriteFailed { .. }));
        assert!(state.is_empty());
    }
}
