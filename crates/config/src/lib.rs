//! Configuration loading, validation, and management for Switchboard.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Every knob has a default matching the shipped behavior, so
//! an empty file (or none at all) yields a working configuration.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Policy enforcement (quotas, confirmation gate)
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Loop detection thresholds
    #[serde(default)]
    pub loops: LoopConfig,

    /// Tool memory windowing
    #[serde(default)]
    pub tool_memory: ToolMemoryConfig,

    /// Conversation context assembly
    #[serde(default)]
    pub context: ContextConfig,
}

/// Per-category per-turn call ceilings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryQuotas {
    pub retrieval: u32,
    pub action: u32,
    pub utility: u32,
}

/// Policy enforcement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Ceilings applied while the session is in text mode.
    #[serde(default = "default_text_quotas")]
    pub text_quotas: CategoryQuotas,

    /// Ceilings applied while the session is in voice mode. Smaller than
    /// text: voice turns have tighter latency budgets.
    #[serde(default = "default_voice_quotas")]
    pub voice_quotas: CategoryQuotas,

    /// How long a minted confirmation token stays valid.
    #[serde(default = "default_confirmation_ttl")]
    pub confirmation_ttl_secs: u64,
}

fn default_text_quotas() -> CategoryQuotas {
    CategoryQuotas { retrieval: 8, action: 4, utility: 10 }
}

fn default_voice_quotas() -> CategoryQuotas {
    CategoryQuotas { retrieval: 4, action: 2, utility: 6 }
}

fn default_confirmation_ttl() -> u64 {
    120
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            text_quotas: default_text_quotas(),
            voice_quotas: default_voice_quotas(),
            confirmation_ttl_secs: default_confirmation_ttl(),
        }
    }
}

/// Loop detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Identical calls tolerated per turn before refusal (the next attempt
    /// is refused).
    #[serde(default = "default_same_call_threshold")]
    pub same_call_threshold: u32,

    /// Structurally empty successes of one tool tolerated per turn.
    #[serde(default = "default_empty_results_threshold")]
    pub empty_results_threshold: u32,

    /// Historical turns retained per session.
    #[serde(default = "default_retained_turns")]
    pub retained_turns: usize,
}

fn default_same_call_threshold() -> u32 {
    2
}

fn default_empty_results_threshold() -> u32 {
    2
}

fn default_retained_turns() -> usize {
    5
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            same_call_threshold: default_same_call_threshold(),
            empty_results_threshold: default_empty_results_threshold(),
            retained_turns: default_retained_turns(),
        }
    }
}

/// Tool memory windowing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMemoryConfig {
    /// Recency ranks that keep the full response payload.
    #[serde(default = "default_full_window")]
    pub full_window: usize,

    /// Total records retained (full + summarized). Older records are
    /// dropped entirely.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Records older than this are dropped regardless of rank.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Argument overlap at or above which a prior call counts as
    /// redundant.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_full_window() -> usize {
    10
}

fn default_max_records() -> usize {
    50
}

fn default_max_age_secs() -> u64 {
    3600
}

fn default_similarity_threshold() -> f64 {
    0.8
}

impl Default for ToolMemoryConfig {
    fn default() -> Self {
        Self {
            full_window: default_full_window(),
            max_records: default_max_records(),
            max_age_secs: default_max_age_secs(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Conversation context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Most recent turns always sent verbatim.
    #[serde(default = "default_raw_tail")]
    pub raw_tail: usize,

    /// Hard token ceiling for the assembled payload.
    #[serde(default = "default_token_ceiling")]
    pub token_ceiling: usize,

    /// Word cap applied to the summary when the payload is over budget.
    #[serde(default = "default_summary_word_cap")]
    pub summary_word_cap: usize,

    /// Wall-clock lifetime of a cached assembled payload.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// How many of the earliest raw-tail turns feed the cache fingerprint.
    #[serde(default = "default_fingerprint_turns")]
    pub fingerprint_turns: usize,
}

fn default_raw_tail() -> usize {
    20
}

fn default_token_ceiling() -> usize {
    4096
}

fn default_summary_word_cap() -> usize {
    150
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_fingerprint_turns() -> usize {
    3
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            raw_tail: default_raw_tail(),
            token_ceiling: default_token_ceiling(),
            summary_word_cap: default_summary_word_cap(),
            cache_ttl_secs: default_cache_ttl_secs(),
            fingerprint_turns: default_fingerprint_turns(),
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl OrchestratorConfig {
    /// Load configuration with environment overrides.
    ///
    /// Reads the file named by `SWITCHBOARD_CONFIG` (falling back to
    /// `switchboard.toml` in the working directory), then applies
    /// individual env overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SWITCHBOARD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("switchboard.toml"));
        let mut config = Self::load_from(&path)?;

        if let Ok(ceiling) = std::env::var("SWITCHBOARD_TOKEN_CEILING") {
            config.context.token_ceiling = ceiling
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("bad SWITCHBOARD_TOKEN_CEILING: {ceiling}")))?;
        }
        if let Ok(ttl) = std::env::var("SWITCHBOARD_CONFIRMATION_TTL_SECS") {
            config.policy.confirmation_ttl_secs = ttl
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("bad SWITCHBOARD_CONFIRMATION_TTL_SECS: {ttl}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path. A missing file yields the
    /// defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency. Called on every load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (mode, q) in [
            ("text", &self.policy.text_quotas),
            ("voice", &self.policy.voice_quotas),
        ] {
            if q.retrieval == 0 || q.action == 0 || q.utility == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{mode} quotas must all be at least 1"
                )));
            }
        }
        if self.loops.same_call_threshold == 0 || self.loops.empty_results_threshold == 0 {
            return Err(ConfigError::Invalid("loop thresholds must be at least 1".into()));
        }
        if self.loops.retained_turns == 0 {
            return Err(ConfigError::Invalid("retained_turns must be at least 1".into()));
        }
        if self.tool_memory.full_window > self.tool_memory.max_records {
            return Err(ConfigError::Invalid(
                "tool_memory.full_window cannot exceed max_records".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tool_memory.similarity_threshold) {
            return Err(ConfigError::Invalid(
                "tool_memory.similarity_threshold must be between 0 and 1".into(),
            ));
        }
        if self.context.raw_tail == 0 {
            return Err(ConfigError::Invalid("context.raw_tail must be at least 1".into()));
        }
        if self.context.token_ceiling == 0 {
            return Err(ConfigError::Invalid("context.token_ceiling must be at least 1".into()));
        }
        if self.context.summary_word_cap == 0 {
            return Err(ConfigError::Invalid(
                "context.summary_word_cap must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.raw_tail, 20);
        assert_eq!(config.tool_memory.full_window, 10);
        assert_eq!(config.tool_memory.max_records, 50);
        assert_eq!(config.loops.retained_turns, 5);
    }

    #[test]
    fn voice_quotas_smaller_than_text() {
        let config = OrchestratorConfig::default();
        assert!(config.policy.voice_quotas.retrieval < config.policy.text_quotas.retrieval);
        assert!(config.policy.voice_quotas.action < config.policy.text_quotas.action);
        assert!(config.policy.voice_quotas.utility < config.policy.text_quotas.utility);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = OrchestratorConfig::load_from(Path::new("/nonexistent/switchboard.toml")).unwrap();
        assert_eq!(config.context.token_ceiling, 4096);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[context]
raw_tail = 10

[policy]
confirmation_ttl_secs = 60
"#
        )
        .unwrap();

        let config = OrchestratorConfig::load_from(file.path()).unwrap();
        assert_eq!(config.context.raw_tail, 10);
        assert_eq!(config.policy.confirmation_ttl_secs, 60);
        // Untouched sections keep their defaults.
        assert_eq!(config.context.token_ceiling, 4096);
        assert_eq!(config.policy.text_quotas.retrieval, 8);
    }

    #[test]
    fn zero_quota_rejected() {
        let mut config = OrchestratorConfig::default();
        config.policy.voice_quotas.action = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn full_window_cannot_exceed_max_records() {
        let mut config = OrchestratorConfig::default();
        config.tool_memory.full_window = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn similarity_threshold_must_be_a_ratio() {
        let mut config = OrchestratorConfig::default();
        config.tool_memory.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
        config.tool_memory.similarity_threshold = -0.1;
        assert!(config.validate().is_err());
        config.tool_memory.similarity_threshold = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[[not toml").unwrap();
        let err = OrchestratorConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
