//! Grounded answer generation
//!
//! Issues the final generation call, constrained to the assembled context,
//! and owns the durable mutation of conversation state: a (user, model)
//! turn pair is committed only if the call succeeds. On failure the
//! just-appended user turn is rolled back so a failed exchange leaves no
//! partial trace in history.

use docsage_common::conversation::{ConversationState, Turn};
use docsage_common::errors::{AppError, Result};
use docsage_common::llm::TextGenerator;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fixed refusal string the model must use when the answer is not
/// derivable from the supplied context. A successful outcome, not an error.
pub const NO_ANSWER_FALLBACK: &str = "I could not find the answer in the provided document.";

/// Build the grounded-answer system instruction for one call
fn answer_instruction(context: &str) -> String {
    format!(
        "You are an expert tutor for the indexed document. You will be given a context of \
relevant information and a user question. Your task is to answer the user's question based \
ONLY on the provided context. If the answer is not in the context, you must say \
\"{}\" Keep your answers clear, concise, and educational.\n\nContext: {}",
        NO_ANSWER_FALLBACK, context
    )
}

/// Generates grounded answers and commits turns to conversation state
pub struct AnswerGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate an answer for `standalone_question` over `context`.
    ///
    /// On success the state grows by exactly one user turn and one model
    /// turn, in that order. On failure the state is unchanged.
    #[instrument(skip(self, context, state), fields(context_len = context.len()))]
    pub async fn generate(
        &self,
        standalone_question: &str,
        context: &str,
        state: &mut ConversationState,
    ) -> Result<String> {
        state.append(Turn::user(standalone_question));

        let instruction = answer_instruction(context);
        match self.generator.generate(state.snapshot(), &instruction).await {
            Ok(answer) => {
                state.append(Turn::model(answer.clone()));
                debug!(answer_len = answer.len(), "Answer generated");
                Ok(answer)
            }
            Err(e) => {
                // Roll back the user turn appended above.
                state.remove_last()?;
                Err(AppError::GenerationFailed {
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_common::conversation::Role;
    use docsage_common::llm::MockGenerator;

    fn generator_with(mock: &MockGenerator) -> AnswerGenerator {
        AnswerGenerator::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_success_commits_turn_pair_in_order() {
        let mock = MockGenerator::new();
        mock.push_response("a stack is a LIFO structure");
        let generator = generator_with(&mock);

        let mut state = ConversationState::new();
        let answer = generator
            .generate("What is a stack?", "stack passage", &mut state)
            .await
            .unwrap();

        assert_eq!(answer, "a stack is a LIFO structure");
        let turns = state.snapshot();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "What is a stack?");
        assert_eq!(turns[1].role, Role::Model);
        assert_eq!(turns[1].text, "a stack is a LIFO structure");
    }

    #[tokio::test]
    async fn test_failure_rolls_back_user_turn() {
        let mock = MockGenerator::new();
        mock.push_failure("upstream 500");
        let generator = generator_with(&mock);

        let mut state = ConversationState::new();
        state.append(Turn::user("prior question"));
        state.append(Turn::model("prior answer"));
        let before = state.clone();

        let err = generator
            .generate("What is a queue?", "queue passage", &mut state)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::GenerationFailed { .. }));
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_instruction_carries_context_and_fallback() {
        let mock = MockGenerator::new();
        mock.push_response("answer");
        let generator = generator_with(&mock);

        let mut state = ConversationState::new();
        generator
            .generate("question", "the relevant passage", &mut state)
            .await
            .unwrap();

        let calls = mock.calls();
        assert!(calls[0].system_instruction.contains("the relevant passage"));
        assert!(calls[0].system_instruction.contains(NO_ANSWER_FALLBACK));
    }

    #[tokio::test]
    async fn test_generation_sees_standalone_question_as_last_turn() {
        let mock = MockGenerator::new();
        mock.push_response("answer");
        let generator = generator_with(&mock);

        let mut state = ConversationState::new();
        state.append(Turn::user("old"));
        state.append(Turn::model("old answer"));

        generator
            .generate("standalone question", "ctx", &mut state)
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].context_len, 3);
        assert_eq!(
            calls[0].last_turn_text.as_deref(),
            Some("standalone question")
        );
    }
}
