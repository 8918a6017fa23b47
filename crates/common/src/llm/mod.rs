//! Text generation capability
//!
//! Provides a unified interface to the generation model used for query
//! rewriting and grounded answering:
//! - Gemini (gemini-2.0-flash via generateContent)
//! - Scripted mock for tests and development

use crate::conversation::Turn;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for conversational text generation
///
/// `turns` is the conversational context in order; `system_instruction`
/// constrains the model's behavior for this single call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Gemini generateContent client
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiInstruction,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiPart>,
}

impl GeminiGenerator {
    /// Create a new Gemini generation client
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
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
            model: model.unwrap_or_else(|| crate::DEFAULT_GENERATION_MODEL.to_string()),
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
        })
    }

    fn build_request(turns: &[Turn], system_instruction: &str) -> GeminiRequest {
        GeminiRequest {
            contents: turns
                .iter()
                .map(|t| GeminiContent {
                    role: t.role.as_str(),
                    parts: vec![GeminiPart {
                        text: t.text.clone(),
                    }],
                })
                .collect(),
            system_instruction: GeminiInstruction {
                parts: vec![GeminiPart {
                    text: system_instruction.to_string(),
                }],
            },
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = Self::build_request(turns, system_instruction);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::upstream("gemini", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "gemini",
                format!("API error {}: {}", status, body),
            ));
        }

        let result: GeminiResponse = response.json().await.map_err(|e| {
            AppError::upstream("gemini", format!("Failed to parse response: {}", e))
        })?;

        result
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| AppError::upstream("gemini", "Empty response"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scripted mock generator for testing
///
/// Returns queued responses in order; an exhausted queue echoes the last
/// user turn, which is convenient for rewrite-is-a-no-op test setups.
#[derive(Clone, Default)]
pub struct MockGenerator {
    script: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// One recorded generation call, for test assertions
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub context_len: usize,
    pub system_instruction: String,
    pub last_turn_text: Option<String>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn push_response(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue an upstream failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().unwrap().push_back(Err(message.into()));
    }

    /// Calls observed so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            context_len: turns.len(),
            system_instruction: system_instruction.to_string(),
            last_turn_text: turns.last().map(|t| t.text.clone()),
        });

        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(AppError::upstream("mock", message)),
            None => Ok(turns
                .last()
                .map(|t| t.text.clone())
                .unwrap_or_default()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

/// Create a generator based on configuration
pub fn create_generator(
    provider: &str,
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
) -> Result<Arc<dyn TextGenerator>> {
    match provider {
        "gemini" => {
            let key = api_key.ok_or_else(|| AppError::Configuration {
                message: "Gemini API key required for generation".to_string(),
            })?;
            Ok(Arc::new(GeminiGenerator::new(key, model, base_url, timeout)?))
        }
        "mock" => Ok(Arc::new(MockGenerator::new())),
        _ => {
            tracing::warn!(provider = provider, "Unknown generation provider, using mock");
            Ok(Arc::new(MockGenerator::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    #[tokio::test]
    async fn test_mock_returns_scripted_responses_in_order() {
        let generator = MockGenerator::new();
        generator.push_response("first");
        generator.push_response("second");

        let turns = vec![Turn::user("q")];
        assert_eq!(generator.generate(&turns, "sys").await.unwrap(), "first");
        assert_eq!(generator.generate(&turns, "sys").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_mock_failure_maps_to_upstream_error() {
        let generator = MockGenerator::new();
        generator.push_failure("service unavailable");

        let err = generator
            .generate(&[Turn::user("q")], "sys")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let generator = MockGenerator::new();
        generator.push_response("ok");

        let turns = vec![Turn::user("a"), Turn::model("b"), Turn::user("c")];
        generator.generate(&turns, "instruction").await.unwrap();

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].context_len, 3);
        assert_eq!(calls[0].last_turn_text.as_deref(), Some("c"));
        assert_eq!(calls[0].system_instruction, "instruction");
    }

    #[test]
    fn test_gemini_request_shape() {
        let turns = vec![Turn::user("question"), Turn::model("answer")];
        let request = GeminiGenerator::build_request(&turns, "be brief");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "question");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
    }
}
