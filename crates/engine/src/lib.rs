//! Orchestration engine for the chatflow CRM
//!
//! Ties together the collaboration state machine, the two-phase tool-calling
//! loop, the industry prompt selector and the analytics aggregator behind a
//! per-conversation serialized facade.

pub mod collaboration;
pub mod engine;
pub mod industry;
pub mod metrics;
pub mod orchestrator;
pub mod prompt;

pub use crate::collaboration::{AiSuggestion, CollaborationController};
pub use crate::engine::{CollaborationStatus, Engine};
pub use crate::industry::{IndustryProfile, IndustryPromptSelector};
pub use crate::metrics::{
    collaboration_score, AnalyticsReport, MetricsAggregator, ScoreWeights, TimeRange,
};
pub use crate::orchestrator::{Orchestrator, TurnOutcome};

use thiserror::Error;

use chatflow_llm::LlmError;
use chatflow_persistence::PersistenceError;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The customer-facing AI path is blocked while a human has control
    #[error("a human agent has control of this conversation")]
    HumanControl,

    /// Collaboration transition not allowed from the current mode
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Bad input to a control operation
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
