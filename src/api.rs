use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::config::{score::parse_bool, ScoreConfig};
use crate::error::{ApiError, UpstreamError};
use crate::llm::{build_scorer_from_config, DynScorer};
use crate::metrics::{record_fallback, record_llm_duration, record_request};
use crate::scoring::{self, ScoreBreakdown, ScorePolicy, ScoreSource, StudentMetrics};

/// Read-only per-process state shared by all requests.
#[derive(Clone)]
pub struct AppState {
    scorer: DynScorer,
    policy: ScorePolicy,
}

impl AppState {
    pub fn new(scorer: DynScorer, policy: ScorePolicy) -> Self {
        Self { scorer, policy }
    }

    pub fn from_config(cfg: &ScoreConfig) -> anyhow::Result<Self> {
        Ok(Self::new(build_scorer_from_config(cfg)?, cfg.policy()))
    }

    pub fn provider_name(&self) -> &'static str {
        self.scorer.provider_name()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/calculatescore", post(calculate_score))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoreQuery {
    /// Same spellings as the boolean env switches: 1/0, true/false, yes/no, on/off.
    #[serde(default, deserialize_with = "lenient_bool")]
    explain: bool,
}

fn lenient_bool<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    parse_bool(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid boolean `{raw}`")))
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub score: f64,
    pub source: ScoreSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

async fn calculate_score(
    State(state): State<AppState>,
    query: Result<Query<ScoreQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<ScoreResponse>, ApiError> {
    let Query(q) = query.map_err(|rej| ApiError::BadRequest(rej.body_text()))?;
    // Decode regardless of Content-Type; only the body shape matters.
    let metrics: StudentMetrics =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let formula = scoring::breakdown(&metrics, state.policy);
    if !formula.is_finite() {
        return Err(ApiError::BadRequest(
            "metrics overflow the score formula".to_string(),
        ));
    }

    let (score, source) = match delegate(&state, &metrics).await {
        Ok(score) => (score, ScoreSource::Llm),
        Err(e) => {
            if !matches!(e, UpstreamError::Disabled) {
                warn!(reason = e.reason(), error = %e, "model scoring failed, using formula");
                record_fallback(&e);
            }
            (formula.total, ScoreSource::Primitive)
        }
    };

    record_request(source);
    debug!(score, source = source.as_str(), "score computed");

    let breakdown = q.explain.then_some(formula);

    Ok(Json(ScoreResponse {
        score,
        source,
        breakdown,
    }))
}

async fn delegate(state: &AppState, metrics: &StudentMetrics) -> Result<f64, UpstreamError> {
    let started = Instant::now();
    let out = state.scorer.score(metrics).await;
    if !matches!(out, Err(UpstreamError::Disabled)) {
        record_llm_duration(started.elapsed().as_secs_f64() * 1000.0);
    }
    out
}
