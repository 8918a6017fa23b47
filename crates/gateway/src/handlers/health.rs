//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub generation: CheckResult,
    pub embedding: CheckResult,
    pub index: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub provider: String,
}

fn check_provider(provider: &str, configured: bool) -> CheckResult {
    CheckResult {
        status: if configured { "configured" } else { "missing" }.to_string(),
        provider: provider.to_string(),
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - reports capability configuration
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let config = &state.config;

    let generation = check_provider(
        &config.llm.provider,
        config.llm.provider == "mock" || config.llm.api_key.is_some(),
    );
    let embedding = check_provider(
        &config.embedding.provider,
        config.embedding.provider == "mock" || config.embedding.api_key.is_some(),
    );
    let index = check_provider(
        &config.index.provider,
        config.index.provider == "memory"
            || (config.index.api_key.is_some() && config.index.host.is_some()),
    );

    let all_ready = [&generation, &embedding, &index]
        .iter()
        .all(|c| c.status == "configured");

    Json(ReadyResponse {
        status: if all_ready { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            generation,
            embedding,
            index,
        },
    })
}
