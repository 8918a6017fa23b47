//! DocSage Query Pipeline
//!
//! The conversational core: given a running chat history and a new user
//! question, produce a context-grounded answer in five sequential stages:
//!
//! 1. Rewrite the follow-up question into a standalone question
//! 2. Retrieve the most relevant passages via vector similarity
//! 3. Assemble a bounded context block
//! 4. Generate a grounded answer
//! 5. Commit the (user, model) turn pair to conversation state
//!
//! State mutation is all-or-nothing: a failed request leaves the session's
//! conversation state exactly as it was before the request.

pub mod context;
pub mod generator;
pub mod pipeline;
pub mod retriever;
pub mod rewriter;

pub use context::{assemble, PASSAGE_DELIMITER};
pub use generator::{AnswerGenerator, NO_ANSWER_FALLBACK};
pub use pipeline::{PipelineStage, QueryPipeline};
pub use retriever::{PassageRetriever, RetrievedPassage};
pub use rewriter::QueryRewriter;
