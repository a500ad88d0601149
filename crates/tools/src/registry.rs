//! Tool registry
//!
//! Registration, tenant-scoped discovery and execution. The registry is the
//! single boundary where tool errors become structured results: nothing past
//! it throws.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chatflow_core::llm_types::{ToolCallRequest, ToolDefinition};

use crate::schema::{Tool, ToolCallResult, ToolContext, ToolError};

/// Tool registry
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with the four standard executors
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(crate::tools::SendMultimediaTool::new());
        registry.register(crate::tools::SaveConversationDataTool::new());
        registry.register(crate::tools::AnalyzeCustomerIntentTool::new());
        registry.register(crate::tools::ScheduleFollowUpTool::new());
        registry
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Definitions offered to the model for one tenant
    ///
    /// Intersection of the registry and the tenant allowlist - never the full
    /// registry. Allowlisted names with no registered tool are skipped.
    pub fn definitions_for(&self, enabled: &[String]) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| enabled.iter().any(|name| name == t.name()))
            .map(|t| t.schema().to_definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute one model-requested call
    ///
    /// Never returns an error: permission rejections, validation failures,
    /// timeouts and executor errors all come back as failed results. Repeated
    /// invocation ids return the recorded result without re-executing.
    pub async fn execute_call(
        &self,
        call: &ToolCallRequest,
        enabled: &[String],
        ctx: &ToolContext,
    ) -> ToolCallResult {
        if let Some(cached) = ctx.cached_result(&call.id) {
            tracing::debug!(
                invocation = %call.id,
                tool = %call.name,
                "duplicate invocation id, returning recorded result"
            );
            return cached;
        }

        let result = self.execute_inner(call, enabled, ctx).await;
        metrics::counter!(
            "chatflow_tool_calls_total",
            "tool" => call.name.clone(),
            "success" => if result.success { "true" } else { "false" },
        )
        .increment(1);

        ctx.record_result(result.clone());
        result
    }

    async fn execute_inner(
        &self,
        call: &ToolCallRequest,
        enabled: &[String],
        ctx: &ToolContext,
    ) -> ToolCallResult {
        if !enabled.iter().any(|name| name == &call.name) {
            let err = ToolError::permission(format!(
                "tool '{}' is not enabled for this tenant",
                call.name
            ));
            tracing::warn!(tool = %call.name, tenant = %ctx.tenant_id, "tool call rejected");
            return ToolCallResult::failure(&call.id, &call.name, &err);
        }

        let tool = match self.tools.get(&call.name) {
            Some(tool) => tool,
            None => {
                let err = ToolError::permission(format!("unknown tool '{}'", call.name));
                return ToolCallResult::failure(&call.id, &call.name, &err);
            }
        };

        let args = call.arguments_value();
        if let Err(err) = tool.validate(&args) {
            return ToolCallResult::failure(&call.id, &call.name, &err);
        }

        ctx.begin_invocation(&call.id);

        let timeout_secs = tool.timeout_secs();
        let outcome =
            tokio::time::timeout(Duration::from_secs(timeout_secs), tool.execute(args, ctx)).await;

        match outcome {
            Ok(Ok(output)) => {
                tracing::debug!(invocation = %call.id, tool = %call.name, "tool call succeeded");
                ToolCallResult::ok(&call.id, &call.name, output.payload)
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    invocation = %call.id,
                    tool = %call.name,
                    error = %err,
                    "tool call failed"
                );
                ToolCallResult::failure(&call.id, &call.name, &err)
            }
            Err(_elapsed) => {
                let err = ToolError::Timeout {
                    tool: call.name.clone(),
                    secs: timeout_secs,
                };
                tracing::warn!(invocation = %call.id, tool = %call.name, "tool call timed out");
                ToolCallResult::failure(&call.id, &call.name, &err)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StubMessagingGateway;
    use chatflow_core::conversation::ConversationContext;
    use chatflow_persistence::PersistenceLayer;
    use parking_lot::Mutex;
    use serde_json::json;
    use uuid::Uuid;

    fn test_ctx() -> ToolContext {
        let layer = PersistenceLayer::in_memory();
        let conversation = Arc::new(Mutex::new(ConversationContext::new(
            Uuid::new_v4(),
            "tenant-1",
            "+5215550001",
        )));
        ToolContext::new(
            "tenant-1",
            conversation,
            layer.leads,
            layer.records,
            layer.follow_ups,
            layer.media,
            Arc::new(StubMessagingGateway::new()),
        )
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            arguments: args
                .as_object()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .collect(),
        }
    }

    fn all_enabled() -> Vec<String> {
        vec![
            "send_multimedia".into(),
            "save_conversation_data".into(),
            "analyze_customer_intent".into(),
            "schedule_follow_up".into(),
        ]
    }

    #[test]
    fn test_definitions_respect_allowlist() {
        let registry = ToolRegistry::with_default_tools();
        assert_eq!(registry.len(), 4);

        let defs = registry.definitions_for(&["send_multimedia".to_string()]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "send_multimedia");

        let defs = registry.definitions_for(&[]);
        assert!(defs.is_empty());

        // Allowlisted but unregistered names are skipped, not invented
        let defs = registry.definitions_for(&["no_such_tool".to_string()]);
        assert!(defs.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_tool_rejected_not_executed() {
        let registry = ToolRegistry::with_default_tools();
        let ctx = test_ctx();

        let result = registry
            .execute_call(
                &call("schedule_follow_up", json!({"delay_hours": 24, "message": "hi"})),
                &["send_multimedia".to_string()],
                &ctx,
            )
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("not enabled"));
        // Nothing persisted
        assert!(ctx.follow_ups.list_pending("tenant-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let registry = ToolRegistry::with_default_tools();
        let ctx = test_ctx();

        let result = registry
            .execute_call(
                &call("drop_tables", json!({})),
                &["drop_tables".to_string()],
                &ctx,
            )
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_duplicate_invocation_id_executes_once() {
        let registry = ToolRegistry::with_default_tools();
        let ctx = test_ctx();

        let request = call("schedule_follow_up", json!({"delay_hours": 24, "message": "hi"}));
        let first = registry.execute_call(&request, &all_enabled(), &ctx).await;
        let second = registry.execute_call(&request, &all_enabled(), &ctx).await;

        assert!(first.success);
        assert_eq!(first.payload, second.payload);
        assert_eq!(
            ctx.follow_ups.list_pending("tenant-1").await.unwrap().len(),
            1
        );
    }
}
