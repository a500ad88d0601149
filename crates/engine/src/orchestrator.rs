//! Orchestration loop
//!
//! Drives the bounded two-phase model call per customer turn:
//! `PROMPT_LLM -> DONE` when the model answers directly, or
//! `PROMPT_LLM -> EXECUTE_TOOLS -> APPEND_RESULTS -> PROMPT_LLM_FINAL -> DONE`
//! when it requests tools. At most one tool round per turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chatflow_config::{AgentConfig, EngineSettings};
use chatflow_core::conversation::{InboundMessage, MessageEntry};
use chatflow_core::llm_types::{ChatMessage, ChatResponse, ToolDefinition};
use chatflow_llm::{ChatBackend, LlmError};
use chatflow_tools::{ToolContext, ToolRegistry};

use crate::industry::IndustryPromptSelector;
use crate::prompt::render_window;

/// Result of one customer turn
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub reply: String,
    /// Executed tool names, in invocation order
    pub tools_used: Vec<String>,
    pub tool_call_count: usize,
    /// False when the turn fell back because the model was unreachable
    pub success: bool,
}

/// The two-phase tool-calling loop
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    registry: Arc<ToolRegistry>,
    selector: Arc<IndustryPromptSelector>,
    settings: EngineSettings,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        registry: Arc<ToolRegistry>,
        selector: Arc<IndustryPromptSelector>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            backend,
            registry,
            selector,
            settings,
        }
    }

    /// Run one customer turn
    ///
    /// The conversation inside `ctx` is mutated in memory only; the caller
    /// persists it when the outcome is successful, which is what keeps a
    /// failed turn resumable.
    pub async fn run_turn(
        &self,
        agent: &AgentConfig,
        inbound: &InboundMessage,
        ctx: &ToolContext,
    ) -> TurnOutcome {
        let started = Instant::now();

        // Industry detection uses the lead's accumulated tags when available
        let tags = match ctx
            .leads
            .find_by_phone(&ctx.tenant_id, &inbound.customer_phone)
            .await
        {
            Ok(Some(lead)) => lead.tags.iter().cloned().collect(),
            _ => Vec::new(),
        };
        let industry = self.selector.detect(&inbound.text, &tags);

        let mut template_ctx = HashMap::new();
        template_ctx.insert("personality".to_string(), agent.personality.clone());
        template_ctx.insert("business".to_string(), agent.business.clone());
        template_ctx.insert("objectives".to_string(), agent.objectives.clone());
        let system_prompt = self.selector.render(industry, &template_ctx);

        // Offered tools: tenant allowlist ∩ industry subset ∩ registry
        let effective: Vec<String> = agent
            .enabled_functions
            .iter()
            .filter(|name| industry.allowed_tools.contains(&name.as_str()))
            .cloned()
            .collect();
        let tools = self.registry.definitions_for(&effective);

        let mut messages = vec![ChatMessage::system(system_prompt)];
        {
            // Render the window before the inbound entry joins the log, then
            // append it: tool-written entries land after it in order. The
            // in-memory log is only persisted on success, so a failed turn
            // discards all of this.
            let mut conversation = ctx.conversation.lock();
            messages.extend(render_window(&conversation, self.settings.history_window));
            conversation.push(MessageEntry::customer(inbound.text.clone()));
        }
        messages.push(ChatMessage::user(inbound.text.clone()));

        tracing::debug!(
            conversation = %inbound.conversation_id,
            industry = industry.key,
            tools_offered = tools.len(),
            "starting turn"
        );

        // Phase 1
        let first = match self.call_model(&messages, &tools).await {
            Ok(response) => response,
            Err(err) => return self.fallback(inbound, err, started),
        };

        if !first.has_tool_calls() {
            return self.finish(first.text, Vec::new(), 0, started, ctx);
        }

        // Phase 2: execute sequentially - later tools may depend on state
        // mutated by earlier ones, and the outbound channel is rate limited
        let mut tools_used = Vec::new();
        let mut result_lines = Vec::new();
        for call in &first.tool_calls {
            let result = self.registry.execute_call(call, &effective, ctx).await;
            tools_used.push(call.name.clone());
            result_lines.push(result.render());
        }
        let tool_call_count = tools_used.len();

        if !first.text.is_empty() {
            messages.push(ChatMessage::assistant(first.text.clone()));
        }
        messages.push(ChatMessage::user(format!(
            "Tool results:\n{}\nWrite the reply to the customer. Acknowledge anything that \
             failed and offer an alternative.",
            result_lines.join("\n")
        )));

        // Final call requests no further tools: one tool round per turn
        let last = match self.call_model(&messages, &[]).await {
            Ok(response) => response,
            Err(err) => return self.fallback(inbound, err, started),
        };

        self.finish(last.text, tools_used, tool_call_count, started, ctx)
    }

    /// One model call with a single bounded retry on transport failure
    async fn call_model(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        match self.backend.chat(messages, tools).await {
            Ok(response) => Ok(response),
            Err(first_err) => {
                tracing::warn!(error = %first_err, "model call failed, retrying once");
                self.backend.chat(messages, tools).await
            }
        }
    }

    fn finish(
        &self,
        reply: String,
        tools_used: Vec<String>,
        tool_call_count: usize,
        started: Instant,
        ctx: &ToolContext,
    ) -> TurnOutcome {
        let reply = if reply.trim().is_empty() {
            // The customer always gets some reply, never silence
            self.settings.fallback_reply.clone()
        } else {
            reply
        };

        ctx.conversation
            .lock()
            .push(MessageEntry::assistant(reply.clone()));

        metrics::histogram!("chatflow_turn_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("chatflow_turns_total", "success" => "true").increment(1);

        TurnOutcome {
            reply,
            tools_used,
            tool_call_count,
            success: true,
        }
    }

    fn fallback(&self, inbound: &InboundMessage, err: LlmError, started: Instant) -> TurnOutcome {
        tracing::error!(
            conversation = %inbound.conversation_id,
            error = %err,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn failed, sending fallback reply"
        );
        metrics::counter!("chatflow_turns_total", "success" => "false").increment(1);

        TurnOutcome {
            reply: self.settings.fallback_reply.clone(),
            tools_used: Vec::new(),
            tool_call_count: 0,
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::conversation::ConversationContext;
    use chatflow_core::llm_types::{StopReason, ToolCallRequest};
    use chatflow_llm::MockBackend;
    use chatflow_persistence::PersistenceLayer;
    use chatflow_tools::StubMessagingGateway;
    use parking_lot::Mutex;
    use serde_json::json;
    use uuid::Uuid;

    fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args
                .as_object()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .collect(),
        }
    }

    fn setup() -> (Arc<MockBackend>, Orchestrator, ToolContext, InboundMessage) {
        let backend = Arc::new(MockBackend::new());
        let orchestrator = Orchestrator::new(
            backend.clone(),
            Arc::new(ToolRegistry::with_default_tools()),
            Arc::new(IndustryPromptSelector::new(6000)),
            EngineSettings::default(),
        );

        let layer = PersistenceLayer::in_memory();
        let conversation_id = Uuid::new_v4();
        let conversation = Arc::new(Mutex::new(ConversationContext::new(
            conversation_id,
            "tenant-1",
            "+5215550001",
        )));
        let ctx = ToolContext::new(
            "tenant-1",
            conversation,
            layer.leads,
            layer.records,
            layer.follow_ups,
            layer.media,
            Arc::new(StubMessagingGateway::new()),
        );
        let inbound = InboundMessage {
            conversation_id,
            tenant_id: "tenant-1".to_string(),
            customer_phone: "+5215550001".to_string(),
            text: "hola".to_string(),
            media_refs: Vec::new(),
        };
        (backend, orchestrator, ctx, inbound)
    }

    #[tokio::test]
    async fn test_no_tool_calls_single_phase() {
        let (backend, orchestrator, ctx, inbound) = setup();
        backend.push_response(ChatResponse::text("¡Hola! ¿En qué puedo ayudarte?"));

        let outcome = orchestrator
            .run_turn(&AgentConfig::default(), &inbound, &ctx)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.tool_call_count, 0);
        assert_eq!(backend.call_count(), 1);
        // Log got inbound + reply
        assert_eq!(ctx.conversation.lock().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_then_final_reply() {
        let (backend, orchestrator, ctx, inbound) = setup();
        backend.push_response(ChatResponse {
            text: String::new(),
            tool_calls: vec![tool_call(
                "call_1",
                "schedule_follow_up",
                json!({"delay_hours": 24, "message": "seguimos pendientes"}),
            )],
            stop_reason: StopReason::ToolUse,
            usage: None,
        });
        backend.push_response(ChatResponse::text("Listo, te escribo mañana."));

        let outcome = orchestrator
            .run_turn(&AgentConfig::default(), &inbound, &ctx)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.tools_used, vec!["schedule_follow_up"]);
        assert_eq!(outcome.tool_call_count, 1);
        assert_eq!(outcome.reply, "Listo, te escribo mañana.");
        assert_eq!(backend.call_count(), 2);
        // The final call must not offer tools
        assert!(backend.calls()[1].tool_names.is_empty());
        assert_eq!(
            ctx.follow_ups.list_pending("tenant-1").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_k_tool_calls_yield_k_invocations_one_reply() {
        let (backend, orchestrator, ctx, inbound) = setup();
        backend.push_response(ChatResponse {
            text: String::new(),
            tool_calls: vec![
                tool_call(
                    "call_1",
                    "analyze_customer_intent",
                    json!({"intent": "purchase", "confidence": 0.9, "tags": ["hot"]}),
                ),
                // This one fails: no menu asset stored
                tool_call("call_2", "send_multimedia", json!({"media_purpose": "menu"})),
                tool_call(
                    "call_3",
                    "schedule_follow_up",
                    json!({"delay_hours": 4, "message": "¿pudiste verlo?"}),
                ),
            ],
            stop_reason: StopReason::ToolUse,
            usage: None,
        });
        backend.push_response(ChatResponse::text("Hecho, aunque el menú no está disponible."));

        let outcome = orchestrator
            .run_turn(&AgentConfig::default(), &inbound, &ctx)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.tool_call_count, 3);
        assert_eq!(
            outcome.tools_used,
            vec!["analyze_customer_intent", "send_multimedia", "schedule_follow_up"]
        );
        // Exactly one reply regardless of the failed tool
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_and_leaves_log_unchanged() {
        let (backend, orchestrator, ctx, inbound) = setup();
        backend.push_error(LlmError::Api("500".into()));
        backend.push_error(LlmError::Api("500 again".into()));

        let outcome = orchestrator
            .run_turn(&AgentConfig::default(), &inbound, &ctx)
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.reply, EngineSettings::default().fallback_reply);
        // One retry happened
        assert_eq!(backend.call_count(), 2);
        // No reply was appended; the caller discards this snapshot anyway
        let conversation = ctx.conversation.lock();
        assert_eq!(conversation.messages.len(), 1);
        assert!(matches!(
            conversation.messages[0].role,
            chatflow_core::conversation::MessageRole::Customer
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_retries_to_success() {
        let (backend, orchestrator, ctx, inbound) = setup();
        backend.push_error(LlmError::Timeout(30));
        backend.push_response(ChatResponse::text("aquí estoy"));

        let outcome = orchestrator
            .run_turn(&AgentConfig::default(), &inbound, &ctx)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.reply, "aquí estoy");
    }

    #[tokio::test]
    async fn test_industry_subset_limits_offered_tools() {
        let (backend, orchestrator, ctx, _) = setup();
        backend.push_response(ChatResponse::text("con gusto"));

        // Healthcare message: send_multimedia must not be offered even though
        // the tenant allowlist has it
        let inbound = InboundMessage {
            conversation_id: ctx.conversation.lock().id,
            tenant_id: "tenant-1".to_string(),
            customer_phone: "+5215550001".to_string(),
            text: "quiero una consulta con la doctora".to_string(),
            media_refs: Vec::new(),
        };
        orchestrator
            .run_turn(&AgentConfig::default(), &inbound, &ctx)
            .await;

        let offered = &backend.calls()[0].tool_names;
        assert!(!offered.contains(&"send_multimedia".to_string()));
        assert!(offered.contains(&"schedule_follow_up".to_string()));
    }

    #[tokio::test]
    async fn test_empty_model_text_never_silences_customer() {
        let (backend, orchestrator, ctx, inbound) = setup();
        backend.push_response(ChatResponse::text("  "));

        let outcome = orchestrator
            .run_turn(&AgentConfig::default(), &inbound, &ctx)
            .await;

        assert!(outcome.success);
        assert!(!outcome.reply.trim().is_empty());
    }
}
