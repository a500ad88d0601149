//! Collaboration state machine
//!
//! Governs which actor may speak to the customer. Modes: `AiOnly` (initial),
//! `HumanOnly`, `Collaboration`. Every transition writes an append-only
//! audit entry; `escalation_level` changes only here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chatflow_config::{AgentConfig, RepeatTakeoverPolicy};
use chatflow_core::conversation::{
    CollaborationMode, ConversationContext, TakeoverEventType, TakeoverLogEntry,
};
use chatflow_core::llm_types::ChatMessage;
use chatflow_llm::ChatBackend;
use chatflow_persistence::TakeoverLogStore;

use crate::EngineError;

/// A reply candidate drafted for the human agent, never auto-sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSuggestion {
    pub title: String,
    pub content: String,
    pub confidence: f64,
}

/// The state machine over one conversation's collaboration mode
pub struct CollaborationController {
    takeovers: Arc<dyn TakeoverLogStore>,
    policy: RepeatTakeoverPolicy,
    max_suggestions: usize,
}

impl CollaborationController {
    pub fn new(
        takeovers: Arc<dyn TakeoverLogStore>,
        policy: RepeatTakeoverPolicy,
        max_suggestions: usize,
    ) -> Self {
        Self {
            takeovers,
            policy,
            max_suggestions,
        }
    }

    /// Log a takeover request without changing the mode
    ///
    /// Advisory signal for the live agent queue.
    pub async fn request_takeover(
        &self,
        conversation: &mut ConversationContext,
        reason: &str,
        requested_by: &str,
    ) -> Result<(), EngineError> {
        let mode = conversation.collaboration_mode;
        self.log(
            conversation,
            TakeoverEventType::Requested,
            mode,
            mode,
            reason,
            requested_by,
        )
        .await?;

        tracing::info!(
            conversation = %conversation.id,
            requested_by,
            reason,
            "takeover requested"
        );
        Ok(())
    }

    /// Transfer control to a human agent
    ///
    /// `AiOnly | Collaboration -> HumanOnly`. A second call while already
    /// `HumanOnly` follows the configured repeat policy.
    pub async fn start_takeover(
        &self,
        conversation: &mut ConversationContext,
        reason: &str,
        actor: &str,
    ) -> Result<(), EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation(
                "takeover reason must not be empty".to_string(),
            ));
        }

        let from = conversation.collaboration_mode;
        if from == CollaborationMode::HumanOnly {
            match self.policy {
                RepeatTakeoverPolicy::Reject => {
                    tracing::warn!(
                        conversation = %conversation.id,
                        "takeover already active, start rejected"
                    );
                    return Err(EngineError::InvalidTransition(
                        "conversation is already in human_only mode".to_string(),
                    ));
                }
                RepeatTakeoverPolicy::Restack => {
                    conversation.escalation_level += 1;
                    self.log(
                        conversation,
                        TakeoverEventType::Started,
                        from,
                        CollaborationMode::HumanOnly,
                        reason,
                        actor,
                    )
                    .await?;
                    return Ok(());
                }
            }
        }

        conversation.collaboration_mode = CollaborationMode::HumanOnly;
        conversation.human_takeover = true;
        conversation.takeover_at = Some(chrono::Utc::now());
        conversation.current_agent_id = Some(actor.to_string());
        conversation.escalation_level += 1;

        self.log(
            conversation,
            TakeoverEventType::Started,
            from,
            CollaborationMode::HumanOnly,
            reason,
            actor,
        )
        .await?;

        metrics::counter!("chatflow_takeovers_total", "event" => "started").increment(1);
        tracing::info!(
            conversation = %conversation.id,
            actor,
            escalation_level = conversation.escalation_level,
            "human takeover started"
        );
        Ok(())
    }

    /// Draft reply candidates for the human agent
    ///
    /// Only valid while `HumanOnly`; this is the one model path allowed in
    /// that mode, and its output is never sent to the customer.
    pub async fn generate_ai_suggestion(
        &self,
        backend: &dyn ChatBackend,
        agent: &AgentConfig,
        conversation: &mut ConversationContext,
        current_message: &str,
    ) -> Result<Vec<AiSuggestion>, EngineError> {
        if conversation.collaboration_mode != CollaborationMode::HumanOnly {
            return Err(EngineError::InvalidTransition(
                "suggestions are only available during a human takeover".to_string(),
            ));
        }

        let history: String = conversation
            .recent(10)
            .iter()
            .map(|m| format!("{:?}: {}\n", m.role, m.content))
            .collect();

        let messages = vec![
            ChatMessage::system(format!(
                "{personality}\nYou are assisting a HUMAN agent who has taken over a \
                 customer conversation. Draft up to {n} reply candidates for the agent. \
                 Respond with a JSON array of objects with keys \"title\", \"content\" \
                 and \"confidence\" (0 to 1). Do not address the customer directly.",
                personality = agent.personality,
                n = self.max_suggestions,
            )),
            ChatMessage::user(format!(
                "Conversation so far:\n{history}\nCustomer's latest message:\n{current_message}"
            )),
        ];

        let response = backend.chat(&messages, &[]).await?;
        let mut suggestions = parse_suggestions(&response.text);
        suggestions.truncate(self.max_suggestions);

        conversation.metadata.ai_suggestions_count += 1;
        let mode = conversation.collaboration_mode;
        self.log(
            conversation,
            TakeoverEventType::AiSuggestion,
            mode,
            mode,
            "suggestion drafted",
            "system",
        )
        .await?;

        metrics::counter!("chatflow_takeovers_total", "event" => "ai_suggestion").increment(1);
        Ok(suggestions)
    }

    /// Return control from the human agent
    ///
    /// `HumanOnly -> return_to` (default `AiOnly`).
    pub async fn end_takeover(
        &self,
        conversation: &mut ConversationContext,
        return_to: CollaborationMode,
        actor: &str,
    ) -> Result<(), EngineError> {
        if conversation.collaboration_mode != CollaborationMode::HumanOnly {
            return Err(EngineError::InvalidTransition(
                "no active takeover to end".to_string(),
            ));
        }
        if return_to == CollaborationMode::HumanOnly {
            return Err(EngineError::Validation(
                "end_takeover must return to ai_only or collaboration".to_string(),
            ));
        }

        let from = conversation.collaboration_mode;
        conversation.collaboration_mode = return_to;
        conversation.human_takeover = false;
        conversation.current_agent_id = None;

        self.log(
            conversation,
            TakeoverEventType::Ended,
            from,
            return_to,
            "takeover ended",
            actor,
        )
        .await?;

        metrics::counter!("chatflow_takeovers_total", "event" => "ended").increment(1);
        tracing::info!(
            conversation = %conversation.id,
            to = return_to.as_str(),
            "human takeover ended"
        );
        Ok(())
    }

    async fn log(
        &self,
        conversation: &ConversationContext,
        event_type: TakeoverEventType,
        from: CollaborationMode,
        to: CollaborationMode,
        reason: &str,
        actor: &str,
    ) -> Result<(), EngineError> {
        self.takeovers
            .append(TakeoverLogEntry::new(
                conversation.id,
                conversation.tenant_id.clone(),
                event_type,
                from,
                to,
                reason,
                actor,
            ))
            .await?;
        Ok(())
    }
}

/// Parse the model's suggestion JSON
///
/// Unparseable output degrades to a single suggestion wrapping the raw text;
/// the human agent always gets something usable.
fn parse_suggestions(text: &str) -> Vec<AiSuggestion> {
    let trimmed = text.trim();
    let json_slice = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };

    match serde_json::from_str::<Vec<AiSuggestion>>(json_slice) {
        Ok(parsed) if !parsed.is_empty() => parsed,
        _ => vec![AiSuggestion {
            title: "Suggested reply".to_string(),
            content: trimmed.to_string(),
            confidence: 0.5,
        }],
    }
}
