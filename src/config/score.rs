// src/config/score.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::warn;

use crate::scoring::ScorePolicy;

pub const DEFAULT_SCORE_CONFIG_PATH: &str = "config/score.toml";
pub const DEFAULT_LLM_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_LLM_MODEL: &str = "deepseek-r1:8b";
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 120_000;

pub const ENV_SCORE_CONFIG_PATH: &str = "SCORE_CONFIG_PATH";
pub const ENV_LLM_ENABLED: &str = "SCORE_LLM_ENABLED";
pub const ENV_LLM_URL: &str = "SCORE_LLM_URL";
pub const ENV_LLM_MODEL: &str = "SCORE_LLM_MODEL";
pub const ENV_LLM_TIMEOUT_MS: &str = "SCORE_LLM_TIMEOUT_MS";
pub const ENV_CAP_ENABLED: &str = "SCORE_CAP_ENABLED";
pub const ENV_CLAMP_RATIOS: &str = "SCORE_CLAMP_RATIOS";

fn default_true() -> bool {
    true
}
fn default_llm_url() -> String {
    DEFAULT_LLM_URL.to_string()
}
fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}
fn default_llm_timeout_ms() -> u64 {
    DEFAULT_LLM_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Ask the generation service first, fall back to the formula on failure.
    #[serde(default = "default_true")]
    pub llm_enabled: bool,
    #[serde(default = "default_llm_url")]
    pub llm_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,
    /// Pull lopsided totals above 0.5 down to 0.5.
    #[serde(default)]
    pub cap_enabled: bool,
    /// Clamp each completion ratio into [0, 1] before weighting.
    #[serde(default)]
    pub clamp_ratios: bool,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            llm_enabled: true,
            llm_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_timeout_ms: DEFAULT_LLM_TIMEOUT_MS,
            cap_enabled: false,
            clamp_ratios: false,
        }
    }
}

impl ScoreConfig {
    pub fn policy(&self) -> ScorePolicy {
        ScorePolicy {
            cap_enabled: self.cap_enabled,
            clamp_ratios: self.clamp_ratios,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ScoreConfig = toml::from_str(s).context("parsing score config TOML")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading score config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Defaults, then the TOML file, then env overrides:
    /// 1) $SCORE_CONFIG_PATH (must exist)
    /// 2) config/score.toml (optional)
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var(ENV_SCORE_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(PathBuf::from(p))?,
            Err(_) => {
                let fallback = PathBuf::from(DEFAULT_SCORE_CONFIG_PATH);
                if fallback.exists() {
                    Self::load_from_file(&fallback)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env();
        Ok(cfg.sanitized())
    }

    /// Overlay SCORE_* env vars. Unparsable values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_bool(ENV_LLM_ENABLED) {
            self.llm_enabled = v;
        }
        if let Some(v) = env_string(ENV_LLM_URL) {
            self.llm_url = v;
        }
        if let Some(v) = env_string(ENV_LLM_MODEL) {
            self.llm_model = v;
        }
        if let Some(raw) = env_string(ENV_LLM_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => self.llm_timeout_ms = ms,
                Err(_) => warn!(var = ENV_LLM_TIMEOUT_MS, value = %raw, "ignoring invalid timeout"),
            }
        }
        if let Some(v) = env_bool(ENV_CAP_ENABLED) {
            self.cap_enabled = v;
        }
        if let Some(v) = env_bool(ENV_CLAMP_RATIOS) {
            self.clamp_ratios = v;
        }
    }

    fn sanitized(mut self) -> Self {
        if self.llm_timeout_ms == 0 {
            self.llm_timeout_ms = DEFAULT_LLM_TIMEOUT_MS;
        }
        if self.llm_url.trim().is_empty() {
            self.llm_url = default_llm_url();
        }
        if self.llm_model.trim().is_empty() {
            self.llm_model = default_llm_model();
        }
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = env_string(key)?;
    let parsed = parse_bool(&raw);
    if parsed.is_none() {
        warn!(var = key, value = %raw, "ignoring invalid boolean");
    }
    parsed
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = ScoreConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ScoreConfig::default());
        assert!(cfg.llm_enabled);
        assert!(!cfg.cap_enabled);
        assert_eq!(cfg.llm_url, DEFAULT_LLM_URL);
    }

    #[test]
    fn toml_fields_override_and_zero_timeout_is_reset() {
        let cfg = ScoreConfig::from_toml_str(
            r#"
llm_enabled = false
cap_enabled = true
llm_timeout_ms = 0
llm_model = "llama3"
"#,
        )
        .unwrap();
        assert!(!cfg.llm_enabled);
        assert!(cfg.cap_enabled);
        assert_eq!(cfg.llm_timeout_ms, DEFAULT_LLM_TIMEOUT_MS);
        assert_eq!(cfg.llm_model, "llama3");
        assert!(cfg.policy().cap_enabled);
    }

    #[test]
    fn unknown_toml_type_is_an_error() {
        assert!(ScoreConfig::from_toml_str("cap_enabled = \"maybe\"").is_err());
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        for t in ["1", "true", "YES", " on "] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["0", "False", "no", "off"] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("sometimes"), None);
    }
}
