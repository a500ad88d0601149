//! Configuration for the chatflow engine
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (YAML or TOML), then `CHATFLOW_`-prefixed environment variables.

pub mod agent;
pub mod settings;

pub use agent::{AgentConfig, RepeatTakeoverPolicy};
pub use settings::{EngineSettings, RuntimeEnvironment, ServerConfig, Settings};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
