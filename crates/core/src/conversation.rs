//! Conversation context and collaboration state
//!
//! The conversation owns the durable, append-only message log and the
//! collaboration state that decides whether the AI or a human agent is in
//! control. It is mutated only through tool executors or the collaboration
//! state machine, never directly by transport code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message in the durable log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Inbound customer message
    Customer,
    /// AI-generated reply
    Assistant,
    /// Reply typed by a human agent during takeover
    HumanAgent,
    /// Tool execution result fed back to the model
    Tool,
}

/// Tool execution metadata attached to a log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMeta {
    /// Invocation id assigned by the model call
    pub invocation_id: String,
    /// Tool that produced this entry
    pub tool_name: String,
    /// Whether the execution succeeded
    pub success: bool,
}

/// One entry in the durable conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_meta: Option<ToolMeta>,
}

impl MessageEntry {
    pub fn customer(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Customer,
            content: content.into(),
            timestamp: Utc::now(),
            tool_meta: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            tool_meta: None,
        }
    }

    pub fn human_agent(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::HumanAgent,
            content: content.into(),
            timestamp: Utc::now(),
            tool_meta: None,
        }
    }

    pub fn tool(content: impl Into<String>, meta: ToolMeta) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            timestamp: Utc::now(),
            tool_meta: Some(meta),
        }
    }
}

/// Which actor is authorized to respond to the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationMode {
    /// AI replies autonomously (initial state)
    #[default]
    AiOnly,
    /// A human agent has taken over; the AI may only draft suggestions
    HumanOnly,
    /// Human and AI work side by side
    Collaboration,
}

impl CollaborationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiOnly => "ai_only",
            Self::HumanOnly => "human_only",
            Self::Collaboration => "collaboration",
        }
    }
}

/// How far a conversation got, used by the metrics aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationOutcome {
    #[default]
    Open,
    Resolved,
    Abandoned,
}

/// Typed conversation metadata
///
/// Replaces the free-form metadata blob with explicit optional fields so
/// boundary validation happens once, at write time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversationMetadata {
    /// Most recent intent detected by analyze_customer_intent
    pub last_intent: Option<String>,
    /// Confidence of the last intent, within [0, 1]
    pub intent_confidence: Option<f64>,
    /// Lead qualification score, within [0, 100]
    pub qualification_score: Option<u8>,
    /// Number of AI suggestions drafted for the human agent
    pub ai_suggestions_count: u32,
}

/// Takeover audit event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeoverEventType {
    /// Advisory signal for the live queue; does not change mode
    Requested,
    /// Human control started
    Started,
    /// Human control ended
    Ended,
    /// AI drafted a suggestion for the human agent
    AiSuggestion,
}

impl TakeoverEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Started => "started",
            Self::Ended => "ended",
            Self::AiSuggestion => "ai_suggestion",
        }
    }
}

/// Append-only takeover audit log entry, immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoverLogEntry {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub tenant_id: String,
    pub event_type: TakeoverEventType,
    pub from_mode: CollaborationMode,
    pub to_mode: CollaborationMode,
    pub reason: String,
    /// Who triggered the event (agent id, "customer", "system")
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl TakeoverLogEntry {
    pub fn new(
        conversation_id: Uuid,
        tenant_id: impl Into<String>,
        event_type: TakeoverEventType,
        from_mode: CollaborationMode,
        to_mode: CollaborationMode,
        reason: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            tenant_id: tenant_id.into(),
            event_type,
            from_mode,
            to_mode,
            reason: reason.into(),
            actor: actor.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Normalized inbound customer event, delivered by the webhook collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub conversation_id: Uuid,
    pub tenant_id: String,
    pub customer_phone: String,
    pub text: String,
    #[serde(default)]
    pub media_refs: Vec<String>,
}

/// Conversation context
///
/// Owned exclusively by the conversation pipeline. `escalation_level` and
/// `collaboration_mode` change only through the collaboration state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub id: Uuid,
    pub tenant_id: String,
    pub customer_phone: String,
    pub messages: Vec<MessageEntry>,
    pub collaboration_mode: CollaborationMode,
    pub escalation_level: u32,
    pub human_takeover: bool,
    pub takeover_at: Option<DateTime<Utc>>,
    pub current_agent_id: Option<String>,
    pub customer_lead_id: Option<Uuid>,
    pub metadata: ConversationMetadata,
    pub outcome: ConversationOutcome,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(id: Uuid, tenant_id: impl Into<String>, customer_phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id: tenant_id.into(),
            customer_phone: customer_phone.into(),
            messages: Vec::new(),
            collaboration_mode: CollaborationMode::AiOnly,
            escalation_level: 0,
            human_takeover: false,
            takeover_at: None,
            current_agent_id: None,
            customer_lead_id: None,
            metadata: ConversationMetadata::default(),
            outcome: ConversationOutcome::Open,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an entry to the durable log
    pub fn push(&mut self, entry: MessageEntry) {
        self.updated_at = Utc::now();
        self.messages.push(entry);
    }

    /// Whether the AI customer-facing path may run right now
    pub fn ai_may_respond(&self) -> bool {
        self.collaboration_mode != CollaborationMode::HumanOnly
    }

    /// The most recent N log entries, oldest first
    pub fn recent(&self, n: usize) -> &[MessageEntry] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}
