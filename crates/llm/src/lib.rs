//! LLM backends for the chatflow engine
//!
//! Exposes the `ChatBackend` trait, the Claude Messages-API backend with
//! native tool_use support, and a scripted mock for tests.

pub mod backend;
pub mod claude;

pub use backend::{ChatBackend, MockBackend};
pub use claude::{ClaudeBackend, ClaudeConfig};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
