//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::agent::AgentConfig;
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Default agent configuration, overridable per tenant
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub engine: EngineSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty means localhost-only
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            cors_enabled: default_true(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Engine-level tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// How many log entries the prompt window renders
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Maximum rendered system prompt length in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Maximum AI suggestions drafted per request while a human is in control
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Fixed reply used when the model call fails past its retry
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Leaderboard weight for tool-assist efficiency
    #[serde(default = "default_w_efficiency")]
    pub score_weight_efficiency: f64,

    /// Leaderboard weight for resolution rate
    #[serde(default = "default_w_resolution")]
    pub score_weight_resolution: f64,

    /// Leaderboard weight for (1 - escalation rate)
    #[serde(default = "default_w_escalation")]
    pub score_weight_escalation: f64,
}

fn default_history_window() -> usize {
    30
}

fn default_max_prompt_chars() -> usize {
    6000
}

fn default_max_suggestions() -> usize {
    3
}

fn default_fallback_reply() -> String {
    "Sorry, we are having a temporary issue on our side. Please try again in a moment."
        .to_string()
}

fn default_w_efficiency() -> f64 {
    0.3
}

fn default_w_resolution() -> f64 {
    0.4
}

fn default_w_escalation() -> f64 {
    0.3
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_prompt_chars: default_max_prompt_chars(),
            max_suggestions: default_max_suggestions(),
            fallback_reply: default_fallback_reply(),
            score_weight_efficiency: default_w_efficiency(),
            score_weight_resolution: default_w_resolution(),
            score_weight_escalation: default_w_escalation(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from an optional file plus `CHATFLOW_` env overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let cfg = builder
            .add_source(Environment::with_prefix("CHATFLOW").separator("__"))
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.history_window == 0 {
            return Err(ConfigError::Invalid(
                "engine.history_window must be at least 1".to_string(),
            ));
        }
        let weight_sum = self.engine.score_weight_efficiency
            + self.engine.score_weight_resolution
            + self.engine.score_weight_escalation;
        if !(0.99..=1.01).contains(&weight_sum) {
            return Err(ConfigError::Invalid(format!(
                "leaderboard score weights must sum to 1.0, got {weight_sum}"
            )));
        }
        self.agent.validate()?;
        Ok(())
    }
}
