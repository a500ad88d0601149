//! End-to-end engine tests with a scripted model backend and stub gateway

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use chatflow_config::Settings;
use chatflow_core::conversation::{CollaborationMode, ConversationOutcome, InboundMessage};
use chatflow_core::llm_types::{ChatResponse, StopReason, ToolCallRequest};
use chatflow_engine::{Engine, EngineError, TimeRange};
use chatflow_llm::{LlmError, MockBackend};
use chatflow_persistence::{MediaAsset, PersistenceLayer};
use chatflow_tools::StubMessagingGateway;

struct Harness {
    engine: Engine,
    backend: Arc<MockBackend>,
    gateway: Arc<StubMessagingGateway>,
}

fn harness() -> Harness {
    let backend = Arc::new(MockBackend::new());
    let gateway = Arc::new(StubMessagingGateway::new());
    let engine = Engine::new(
        backend.clone(),
        PersistenceLayer::in_memory(),
        gateway.clone(),
        Settings::default(),
    );
    Harness {
        engine,
        backend,
        gateway,
    }
}

fn inbound(conversation_id: Uuid, text: &str) -> InboundMessage {
    InboundMessage {
        conversation_id,
        tenant_id: "tenant-1".to_string(),
        customer_phone: "+5215550001".to_string(),
        text: text.to_string(),
        media_refs: Vec::new(),
    }
}

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

fn tool_response(calls: Vec<ToolCallRequest>) -> ChatResponse {
    ChatResponse {
        text: String::new(),
        tool_calls: calls,
        stop_reason: StopReason::ToolUse,
        usage: None,
    }
}

/// "Quiero ver el menú" with send_multimedia allowed but no stored menu
/// asset: the tool fails with "No menu file found", the turn still succeeds
/// and the final reply can apologize.
#[tokio::test]
async fn restaurant_menu_missing_asset_scenario() {
    let h = harness();
    let conversation_id = Uuid::new_v4();

    h.backend.push_response(tool_response(vec![tool_call(
        "call_1",
        "send_multimedia",
        json!({"media_purpose": "menu"}),
    )]));
    h.backend.push_response(ChatResponse::text(
        "Lo siento, ahora mismo no tengo el menú a la mano. ¿Te digo los platillos del día?",
    ));

    let outcome = h
        .engine
        .handle_inbound(inbound(conversation_id, "Quiero ver el menú"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.tools_used, vec!["send_multimedia"]);
    assert_eq!(outcome.tool_call_count, 1);
    assert!(!outcome.reply.is_empty());
    assert_eq!(h.gateway.sent_count(), 0);

    // The failure was surfaced to the final model call
    let final_call = &h.backend.calls()[1];
    let last = final_call.messages.last().unwrap();
    assert!(last.content.contains("No menu file found"));
    assert!(last.content.contains("\"success\":false"));
}

/// Same message with the asset present: media goes out exactly once.
#[tokio::test]
async fn restaurant_menu_present_sends_media() {
    let h = harness();
    let conversation_id = Uuid::new_v4();
    h.engine
        .persistence()
        .media
        .upsert(MediaAsset::new(
            "tenant-1",
            "menu",
            "https://cdn.example/menu.pdf",
            "application/pdf",
        ))
        .await
        .unwrap();

    h.backend.push_response(tool_response(vec![tool_call(
        "call_1",
        "send_multimedia",
        json!({"media_purpose": "menu", "caption": "¡Aquí está nuestro menú!"}),
    )]));
    h.backend
        .push_response(ChatResponse::text("Te acabo de enviar el menú."));

    let outcome = h
        .engine
        .handle_inbound(inbound(conversation_id, "Quiero ver el menú"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(h.gateway.sent_count(), 1);
    assert_eq!(
        h.gateway.sent()[0].media_url.as_deref(),
        Some("https://cdn.example/menu.pdf")
    );

    // Durable log: media entry + inbound + reply
    let conversation = h
        .engine
        .persistence()
        .conversations
        .get(conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.messages.len(), 3);
}

/// While a human has control, the customer-facing model path never runs.
#[tokio::test]
async fn human_only_blocks_customer_facing_model() {
    let h = harness();
    let conversation_id = Uuid::new_v4();

    // Create the conversation with one normal turn
    h.backend.push_response(ChatResponse::text("¡Hola!"));
    h.engine
        .handle_inbound(inbound(conversation_id, "hola"))
        .await
        .unwrap();
    assert_eq!(h.backend.call_count(), 1);

    h.engine
        .start_takeover(conversation_id, "customer asked for a human", "agent-7")
        .await
        .unwrap();

    let err = h
        .engine
        .handle_inbound(inbound(conversation_id, "sigo esperando"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::HumanControl));
    // No additional model call, nothing sent
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.gateway.sent_count(), 0);

    // Suggestions are the one allowed model path
    h.backend.push_response(ChatResponse::text(
        r#"[{"title": "Greet", "content": "Hola, soy Marco, ya te atiendo.", "confidence": 0.8}]"#,
    ));
    let suggestions = h
        .engine
        .ai_suggestions(conversation_id, "sigo esperando")
        .await
        .unwrap();
    assert_eq!(suggestions.len(), 1);
    // Suggestion content never reaches the gateway
    assert_eq!(h.gateway.sent_count(), 0);

    let status = h.engine.collaboration_status(conversation_id).await.unwrap();
    assert!(status.is_human_takeover);
    assert_eq!(status.collaboration_mode, CollaborationMode::HumanOnly);
    assert_eq!(status.ai_suggestions_count, 1);
    assert_eq!(
        status.last_ai_suggestion.unwrap().content,
        "Hola, soy Marco, ya te atiendo."
    );
}

/// Double start without an end is rejected and changes nothing.
#[tokio::test]
async fn double_start_takeover_is_noop() {
    let h = harness();
    let conversation_id = Uuid::new_v4();

    h.backend.push_response(ChatResponse::text("hola"));
    h.engine
        .handle_inbound(inbound(conversation_id, "hola"))
        .await
        .unwrap();

    h.engine
        .start_takeover(conversation_id, "first", "agent-7")
        .await
        .unwrap();
    let err = h
        .engine
        .start_takeover(conversation_id, "second", "agent-8")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    let status = h.engine.collaboration_status(conversation_id).await.unwrap();
    assert_eq!(status.collaboration_mode, CollaborationMode::HumanOnly);
    assert_eq!(status.escalation_level, 1);
}

/// Ending a takeover restores the AI path.
#[tokio::test]
async fn end_takeover_restores_ai_path() {
    let h = harness();
    let conversation_id = Uuid::new_v4();

    h.backend.push_response(ChatResponse::text("hola"));
    h.engine
        .handle_inbound(inbound(conversation_id, "hola"))
        .await
        .unwrap();
    h.engine
        .start_takeover(conversation_id, "escalated", "agent-7")
        .await
        .unwrap();
    h.engine
        .end_takeover(conversation_id, CollaborationMode::AiOnly, "agent-7")
        .await
        .unwrap();

    h.backend.push_response(ChatResponse::text("ya regresé"));
    let outcome = h
        .engine
        .handle_inbound(inbound(conversation_id, "¿hay alguien?"))
        .await
        .unwrap();
    assert!(outcome.success);

    let status = h.engine.collaboration_status(conversation_id).await.unwrap();
    assert!(!status.is_human_takeover);
    // started + ended in the history
    assert_eq!(status.history.len(), 2);
}

/// Model unreachable past its retry: fallback reply, engine failure, store
/// untouched and the turn is resumable.
#[tokio::test]
async fn model_failure_leaves_conversation_resumable() {
    let h = harness();
    let conversation_id = Uuid::new_v4();

    h.backend.push_error(LlmError::Api("503".into()));
    h.backend.push_error(LlmError::Api("503".into()));

    let outcome = h
        .engine
        .handle_inbound(inbound(conversation_id, "hola"))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(!outcome.reply.is_empty());

    // Nothing persisted for the failed turn
    assert!(h
        .engine
        .persistence()
        .conversations
        .get(conversation_id)
        .await
        .unwrap()
        .is_none());

    // Retrying the same inbound now succeeds
    h.backend.push_response(ChatResponse::text("ahora sí, ¡hola!"));
    let outcome = h
        .engine
        .handle_inbound(inbound(conversation_id, "hola"))
        .await
        .unwrap();
    assert!(outcome.success);
    let conversation = h
        .engine
        .persistence()
        .conversations
        .get(conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.messages.len(), 2);
}

/// The analytics report reflects a full takeover cycle.
#[tokio::test]
async fn analytics_reflect_takeover_cycle() {
    let h = harness();
    let conversation_id = Uuid::new_v4();

    h.backend.push_response(ChatResponse::text("hola"));
    h.engine
        .handle_inbound(inbound(conversation_id, "hola"))
        .await
        .unwrap();

    h.engine
        .request_takeover(conversation_id, "queue please", "customer")
        .await
        .unwrap();
    h.engine
        .start_takeover(conversation_id, "complaint", "agent-7")
        .await
        .unwrap();
    h.backend.push_response(ChatResponse::text(
        r#"[{"title": "t", "content": "c", "confidence": 0.9}]"#,
    ));
    h.engine
        .ai_suggestions(conversation_id, "estoy molesto")
        .await
        .unwrap();
    h.engine
        .end_takeover(conversation_id, CollaborationMode::AiOnly, "agent-7")
        .await
        .unwrap();
    h.engine
        .set_outcome(conversation_id, ConversationOutcome::Resolved)
        .await
        .unwrap();

    let report = h.engine.analytics(TimeRange::Day).await.unwrap();
    assert_eq!(report.overview.takeover_requests, 1);
    assert_eq!(report.overview.takeovers_started, 1);
    assert_eq!(report.overview.takeovers_ended, 1);
    assert_eq!(report.overview.ai_suggestions, 1);
    assert_eq!(report.overview.total_conversations, 1);
    assert_eq!(report.overview.resolution_rate, 1.0);
    assert_eq!(report.overview.escalation_rate, 1.0);
    assert_eq!(report.efficiency.tool_assist_efficiency, 1.0);
    assert!(report.efficiency.avg_takeover_duration_secs >= 0.0);
    assert_eq!(report.performance.len(), 1);
    assert_eq!(report.performance[0].tenant_id, "tenant-1");
}

/// Tenant allowlist restricts what the model is offered.
#[tokio::test]
async fn tenant_allowlist_restricts_offered_tools() {
    let backend = Arc::new(MockBackend::new());
    let gateway = Arc::new(StubMessagingGateway::new());
    let mut settings = Settings::default();
    settings.agent.enabled_functions =
        vec!["analyze_customer_intent".to_string(), "schedule_follow_up".to_string()];
    let engine = Engine::new(
        backend.clone(),
        PersistenceLayer::in_memory(),
        gateway,
        settings,
    );

    backend.push_response(ChatResponse::text("hola"));
    engine
        .handle_inbound(inbound(Uuid::new_v4(), "quiero ver el menú"))
        .await
        .unwrap();

    let offered = &backend.calls()[0].tool_names;
    assert!(!offered.contains(&"send_multimedia".to_string()));
    assert!(!offered.contains(&"save_conversation_data".to_string()));
    assert!(offered.contains(&"schedule_follow_up".to_string()));
}

/// A model-requested tool outside the allowlist is rejected, not executed,
/// and the turn still completes.
#[tokio::test]
async fn disallowed_tool_request_is_rejected_but_turn_completes() {
    let backend = Arc::new(MockBackend::new());
    let gateway = Arc::new(StubMessagingGateway::new());
    let mut settings = Settings::default();
    settings.agent.enabled_functions = vec!["analyze_customer_intent".to_string()];
    let engine = Engine::new(
        backend.clone(),
        PersistenceLayer::in_memory(),
        gateway.clone(),
        settings,
    );

    backend.push_response(tool_response(vec![tool_call(
        "call_1",
        "send_multimedia",
        json!({"media_purpose": "menu"}),
    )]));
    backend.push_response(ChatResponse::text("no puedo enviar archivos ahora"));

    let outcome = engine
        .handle_inbound(inbound(Uuid::new_v4(), "mándame el menú"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.tool_call_count, 1);
    assert_eq!(gateway.sent_count(), 0);

    let final_call = &backend.calls()[1];
    let last = final_call.messages.last().unwrap();
    assert!(last.content.contains("not enabled"));
}
