// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod scoring;
pub mod telemetry;

use axum::Router;
use tracing::info;

pub use crate::api::{router, AppState};
pub use crate::config::ScoreConfig;
pub use crate::scoring::{ScorePolicy, ScoreSource, StudentMetrics};

/// Build the full HTTP app from `ScoreConfig::load()` (file + env).
pub async fn app() -> anyhow::Result<Router> {
    let cfg = ScoreConfig::load()?;
    build_app(&cfg)
}

/// Build the full HTTP app (score routes + `/metrics`) from an explicit config.
pub fn build_app(cfg: &ScoreConfig) -> anyhow::Result<Router> {
    let metrics = metrics::Metrics::init(cfg.llm_timeout_ms)?;
    let state = AppState::from_config(cfg)?;

    info!(
        provider = state.provider_name(),
        llm_url = %cfg.llm_url,
        llm_model = %cfg.llm_model,
        llm_timeout_ms = cfg.llm_timeout_ms,
        cap_enabled = cfg.cap_enabled,
        clamp_ratios = cfg.clamp_ratios,
        "readiness score service configured"
    );

    Ok(api::router(state).merge(metrics.router()))
}
