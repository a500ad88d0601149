//! Tool contract, schema builders and structured results

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use chatflow_core::conversation::ConversationContext;
use chatflow_core::llm_types::ToolDefinition;
use chatflow_persistence::{FollowUpStore, LeadStore, MediaAssetStore, RecordStore};

use crate::gateway::MessagingGateway;

/// Tool execution errors
///
/// These never cross the registry boundary; the registry converts them into
/// `ToolCallResult` failures before the orchestrator sees them.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments outside schema bounds
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Referenced entity missing
    #[error("{0}")]
    NotFound(String),

    /// Tool outside the tenant allowlist, or unknown
    #[error("permission denied: {0}")]
    Permission(String),

    /// Downstream service failed; caller may retry
    #[error("external service error: {0}")]
    External(String),

    #[error("tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::External(_) | Self::Timeout { .. })
    }
}

/// What kind of side effect a tool performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Sends something to the customer through the messaging gateway
    OutboundMessage,
    /// Writes a business record
    Persistence,
    /// Mutates the customer lead
    LeadMutation,
    /// Creates a scheduled task
    Scheduling,
}

/// Successful tool output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub payload: Value,
}

impl ToolOutput {
    pub fn json(payload: Value) -> Self {
        Self { payload }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            payload: json!({ "message": content.into() }),
        }
    }
}

/// Structured result of one tool invocation
///
/// This is what gets appended to the conversation as a tool-result message,
/// success or failure alike, so the final model call can acknowledge it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub invocation_id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retryable: bool,
}

impl ToolCallResult {
    pub fn ok(invocation_id: impl Into<String>, tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            success: true,
            payload: Some(payload),
            error: None,
            retryable: false,
        }
    }

    pub fn failure(
        invocation_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: &ToolError,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            success: false,
            payload: None,
            error: Some(error.to_string()),
            retryable: error.retryable(),
        }
    }

    /// Render for the tool-result message fed back to the model
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"tool_name\":\"{}\",\"success\":{}}}",
                self.tool_name, self.success
            )
        })
    }
}

/// Per-turn execution state: idempotency and duplicate-media suppression
#[derive(Debug, Default)]
pub struct TurnState {
    /// Invocation id currently executing
    current_invocation: Option<String>,
    /// Media purposes already delivered this turn
    sent_media: HashSet<String>,
    /// Results keyed by invocation id
    executed: HashMap<String, ToolCallResult>,
}

/// Everything an executor may touch
///
/// Repositories are injected explicitly; there is no ambient database client.
/// The conversation is shared with the orchestrator, which holds the
/// per-conversation lock for the whole turn.
pub struct ToolContext {
    pub tenant_id: String,
    pub conversation: Arc<Mutex<ConversationContext>>,
    pub leads: Arc<dyn LeadStore>,
    pub records: Arc<dyn RecordStore>,
    pub follow_ups: Arc<dyn FollowUpStore>,
    pub media: Arc<dyn MediaAssetStore>,
    pub gateway: Arc<dyn MessagingGateway>,
    turn: Mutex<TurnState>,
}

impl ToolContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: impl Into<String>,
        conversation: Arc<Mutex<ConversationContext>>,
        leads: Arc<dyn LeadStore>,
        records: Arc<dyn RecordStore>,
        follow_ups: Arc<dyn FollowUpStore>,
        media: Arc<dyn MediaAssetStore>,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            conversation,
            leads,
            records,
            follow_ups,
            media,
            gateway,
            turn: Mutex::new(TurnState::default()),
        }
    }

    /// Invocation id of the call currently executing
    pub fn invocation_id(&self) -> String {
        self.turn
            .lock()
            .current_invocation
            .clone()
            .unwrap_or_default()
    }

    pub(crate) fn begin_invocation(&self, id: &str) {
        self.turn.lock().current_invocation = Some(id.to_string());
    }

    pub(crate) fn cached_result(&self, id: &str) -> Option<ToolCallResult> {
        self.turn.lock().executed.get(id).cloned()
    }

    pub(crate) fn record_result(&self, result: ToolCallResult) {
        self.turn
            .lock()
            .executed
            .insert(result.invocation_id.clone(), result);
    }

    /// Mark a media purpose as delivered this turn; returns false if it
    /// already was
    pub fn mark_media_sent(&self, purpose: &str) -> bool {
        self.turn.lock().sent_media.insert(purpose.to_string())
    }

    pub fn media_already_sent(&self, purpose: &str) -> bool {
        self.turn.lock().sent_media.contains(purpose)
    }
}

/// Tool schema: name, description and JSON Schema input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSchema {
    /// Convert to the neutral definition offered to the model
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        )
    }
}

/// JSON Schema object builder
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: &str, prop: PropertySchema, required: bool) -> Self {
        self.properties.insert(name.to_string(), prop.0);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// JSON Schema property builder
#[derive(Debug, Clone)]
pub struct PropertySchema(Value);

impl PropertySchema {
    pub fn string(description: &str) -> Self {
        Self(json!({ "type": "string", "description": description }))
    }

    pub fn number(description: &str) -> Self {
        Self(json!({ "type": "number", "description": description }))
    }

    pub fn integer(description: &str) -> Self {
        Self(json!({ "type": "integer", "description": description }))
    }

    pub fn boolean(description: &str) -> Self {
        Self(json!({ "type": "boolean", "description": description }))
    }

    pub fn object(description: &str) -> Self {
        Self(json!({ "type": "object", "description": description }))
    }

    pub fn string_array(description: &str) -> Self {
        Self(json!({
            "type": "array",
            "items": { "type": "string" },
            "description": description,
        }))
    }

    pub fn enum_type(description: &str, values: Vec<String>) -> Self {
        Self(json!({
            "type": "string",
            "description": description,
            "enum": values,
        }))
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        if let Some(obj) = self.0.as_object_mut() {
            obj.insert("minimum".to_string(), json!(min));
            obj.insert("maximum".to_string(), json!(max));
        }
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        if let Some(obj) = self.0.as_object_mut() {
            obj.insert("default".to_string(), value);
        }
        self
    }
}

/// Tool executor contract
///
/// `execute` must convert every internal failure into a `ToolError`; the
/// registry turns those into structured results. Nothing a tool does may
/// panic past this boundary.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn schema(&self) -> ToolSchema;

    fn side_effect(&self) -> SideEffect;

    /// Conversation fields this tool reads; used for registry introspection
    fn required_context(&self) -> &[&str] {
        &[]
    }

    /// Cheap argument validation before execution
    fn validate(&self, _args: &Value) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;

    fn timeout_secs(&self) -> u64 {
        30
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_schema_builder() {
        let schema = InputSchema::object()
            .property("media_purpose", PropertySchema::string("asset purpose"), true)
            .property(
                "delay_hours",
                PropertySchema::number("hours to wait").with_range(1.0, 720.0),
                false,
            )
            .build();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"][0], "media_purpose");
        assert_eq!(schema["properties"]["delay_hours"]["minimum"], 1.0);
        assert_eq!(schema["properties"]["delay_hours"]["maximum"], 720.0);
    }

    #[test]
    fn test_failure_result_carries_retryability() {
        let err = ToolError::External("gateway down".into());
        let result = ToolCallResult::failure("call_1", "send_multimedia", &err);
        assert!(!result.success);
        assert!(result.retryable);

        let err = ToolError::invalid_params("delay_hours out of range");
        let result = ToolCallResult::failure("call_2", "schedule_follow_up", &err);
        assert!(!result.retryable);
    }

    #[test]
    fn test_result_render_is_json() {
        let result = ToolCallResult::ok("call_1", "save_conversation_data", json!({"id": 1}));
        let rendered = result.render();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["tool_name"], "save_conversation_data");
    }
}
