//! Generation-service scorer: prompt building, the Ollama call, and reply parsing.
//! Handlers only see the `LlmScorer` trait so tests can swap in mock scorers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ScoreConfig;
use crate::error::UpstreamError;
use crate::scoring::StudentMetrics;

pub const ENV_LLM_TEST_MODE: &str = "SCORE_LLM_TEST_MODE";
/// Score returned by the mock scorer in `SCORE_LLM_TEST_MODE=mock`.
pub const MOCK_SCORE: f64 = 0.75;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[async_trait]
pub trait LlmScorer: Send + Sync {
    /// One best-effort attempt. No retries.
    async fn score(&self, metrics: &StudentMetrics) -> Result<f64, UpstreamError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynScorer = Arc<dyn LlmScorer>;

/// Factory: build a scorer according to config and environment.
///
/// * `SCORE_LLM_TEST_MODE=mock` returns a scorer with a fixed answer.
/// * `SCORE_LLM_TEST_MODE=error` returns a scorer that always fails.
/// * Else `llm_enabled == false` returns a disabled scorer.
/// * Else the real Ollama scorer.
pub fn build_scorer_from_config(cfg: &ScoreConfig) -> anyhow::Result<DynScorer> {
    match std::env::var(ENV_LLM_TEST_MODE).ok().as_deref() {
        Some("mock") => return Ok(Arc::new(MockScorer::fixed(MOCK_SCORE))),
        Some("error") => return Ok(Arc::new(MockScorer::failing("mock failure"))),
        _ => {}
    }

    if !cfg.llm_enabled {
        return Ok(Arc::new(DisabledScorer));
    }

    Ok(Arc::new(OllamaScorer::from_config(cfg)?))
}

/// Natural-language instruction sent to the model. Values use two decimals.
pub fn build_prompt(m: &StudentMetrics) -> String {
    format!(
        "Given the following student metrics:\n\
         VideosWatched: {:.2} out of {:.2}\n\
         NotesCompleted: {:.2} out of {:.2}\n\
         AssignmentsDone: {:.2} out of {:.2}\n\
         Return a single float score between 0 and 1, and nothing else.",
        m.videos_watched,
        m.total_videos,
        m.notes_completed,
        m.total_notes,
        m.assignments_done,
        m.total_assignments,
    )
}

/// The reply must be a bare finite float, surrounding whitespace allowed.
pub fn parse_score_text(text: &str) -> Result<f64, UpstreamError> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(UpstreamError::Parse {
            raw: trimmed.to_string(),
        }),
    }
}

// ------------------------------------------------------------
// Ollama
// ------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaScorer {
    http: reqwest::Client,
    url: String,
    model: String,
    timeout_ms: u64,
}

impl OllamaScorer {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("readiness-score/0.1")
            .timeout(timeout)
            .build()
            .context("building generation HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
            model: model.into(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn from_config(cfg: &ScoreConfig) -> anyhow::Result<Self> {
        Self::new(
            cfg.llm_url.clone(),
            cfg.llm_model.clone(),
            Duration::from_millis(cfg.llm_timeout_ms),
        )
    }

    fn classify(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(self.timeout_ms)
        } else {
            UpstreamError::Transport(e)
        }
    }
}

#[async_trait]
impl LlmScorer for OllamaScorer {
    async fn score(&self, metrics: &StudentMetrics) -> Result<f64, UpstreamError> {
        let prompt = build_prompt(metrics);
        trace!(%prompt, model = %self.model, "generation prompt");

        let req = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(|e| self.classify(e))?;
        let body: GenerateResponse =
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        parse_score_text(&body.response)
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Always `UpstreamError::Disabled`; used when delegation is off.
pub struct DisabledScorer;

#[async_trait]
impl LlmScorer for DisabledScorer {
    async fn score(&self, _metrics: &StudentMetrics) -> Result<f64, UpstreamError> {
        Err(UpstreamError::Disabled)
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed outcome for tests and local runs without a model.
#[derive(Clone, Debug)]
pub struct MockScorer {
    outcome: Result<f64, String>,
}

impl MockScorer {
    pub fn fixed(score: f64) -> Self {
        Self { outcome: Ok(score) }
    }

    /// Fails with a parse error carrying `raw`, like an unusable model reply.
    pub fn failing(raw: impl Into<String>) -> Self {
        Self {
            outcome: Err(raw.into()),
        }
    }
}

#[async_trait]
impl LlmScorer for MockScorer {
    async fn score(&self, _metrics: &StudentMetrics) -> Result<f64, UpstreamError> {
        match &self.outcome {
            Ok(v) => Ok(*v),
            Err(raw) => Err(UpstreamError::Parse { raw: raw.clone() }),
        }
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
