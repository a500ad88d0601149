//! Per-tenant agent configuration

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Policy for `start_takeover` arriving while a human already has control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatTakeoverPolicy {
    /// Second call is rejected; mode and escalation level unchanged
    #[default]
    Reject,
    /// Escalation level is re-incremented and a fresh event logged
    Restack,
}

/// Agent configuration
///
/// `enabled_functions` is the tenant allowlist; the engine offers the model
/// the intersection of this list and the registry, never the full registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model name passed to the LLM backend
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Tools this tenant may offer the model
    #[serde(default = "default_enabled_functions")]
    pub enabled_functions: Vec<String>,

    /// Persona fragment injected into the system prompt
    #[serde(default = "default_personality")]
    pub personality: String,

    /// Business description fragment
    #[serde(default)]
    pub business: String,

    /// Conversation objectives fragment
    #[serde(default = "default_objectives")]
    pub objectives: String,

    #[serde(default)]
    pub repeat_takeover_policy: RepeatTakeoverPolicy,
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> usize {
    1024
}

fn default_enabled_functions() -> Vec<String> {
    vec![
        "send_multimedia".to_string(),
        "save_conversation_data".to_string(),
        "analyze_customer_intent".to_string(),
        "schedule_follow_up".to_string(),
    ]
}

fn default_personality() -> String {
    "You are a warm, concise customer assistant replying over WhatsApp.".to_string()
}

fn default_objectives() -> String {
    "Answer the customer's question, capture relevant business data, and \
     qualify the lead without being pushy."
        .to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            enabled_functions: default_enabled_functions(),
            personality: default_personality(),
            business: String::new(),
            objectives: default_objectives(),
            repeat_takeover_policy: RepeatTakeoverPolicy::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::Invalid("agent.model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "agent.temperature out of range: {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_tokens must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether the tenant allowlist contains a tool
    pub fn is_enabled(&self, tool: &str) -> bool {
        self.enabled_functions.iter().any(|t| t == tool)
    }
}
