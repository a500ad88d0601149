//! Follow-up scheduling tool

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use chatflow_core::lead::{FollowUpPriority, FollowUpStatus, FollowUpTask};

use crate::schema::{
    InputSchema, PropertySchema, SideEffect, Tool, ToolContext, ToolError, ToolOutput, ToolSchema,
};

/// Inclusive delay bounds in hours (1 hour to 30 days)
const MIN_DELAY_HOURS: f64 = 1.0;
const MAX_DELAY_HOURS: f64 = 720.0;

pub struct ScheduleFollowUpTool;

impl ScheduleFollowUpTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScheduleFollowUpTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScheduleFollowUpTool {
    fn name(&self) -> &str {
        "schedule_follow_up"
    }

    fn description(&self) -> &str {
        "Schedule a follow-up message to the customer after a delay"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property(
                    "delay_hours",
                    PropertySchema::number("Hours to wait before the follow-up")
                        .with_range(MIN_DELAY_HOURS, MAX_DELAY_HOURS),
                    true,
                )
                .property(
                    "message",
                    PropertySchema::string("Message to send at follow-up time"),
                    true,
                )
                .property(
                    "task_type",
                    PropertySchema::string("Kind of follow-up, e.g. 'reminder', 'quote'")
                        .with_default(json!("follow_up")),
                    false,
                )
                .property(
                    "priority",
                    PropertySchema::enum_type(
                        "Task priority",
                        vec!["low".into(), "normal".into(), "high".into()],
                    )
                    .with_default(json!("normal")),
                    false,
                )
                .build(),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Scheduling
    }

    fn required_context(&self) -> &[&str] {
        &["tenant_id"]
    }

    fn validate(&self, args: &Value) -> Result<(), ToolError> {
        let delay = args
            .get("delay_hours")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ToolError::invalid_params("delay_hours is required"))?;
        if !(MIN_DELAY_HOURS..=MAX_DELAY_HOURS).contains(&delay) {
            return Err(ToolError::invalid_params(format!(
                "delay_hours must be within [{MIN_DELAY_HOURS}, {MAX_DELAY_HOURS}], got {delay}"
            )));
        }
        if args
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::is_empty)
            .unwrap_or(true)
        {
            return Err(ToolError::invalid_params("message is required"));
        }
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        self.validate(&args)?;

        let delay_hours = args
            .get("delay_hours")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ToolError::invalid_params("delay_hours is required"))?;
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::invalid_params("message is required"))?;
        let task_type = args
            .get("task_type")
            .and_then(|v| v.as_str())
            .unwrap_or("follow_up");
        let priority = match args.get("priority").and_then(|v| v.as_str()) {
            Some("low") => FollowUpPriority::Low,
            Some("high") => FollowUpPriority::High,
            _ => FollowUpPriority::Normal,
        };

        let conversation_id = ctx.conversation.lock().id;
        let scheduled_at = Utc::now() + Duration::minutes((delay_hours * 60.0) as i64);

        let task = FollowUpTask {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id.clone(),
            conversation_id,
            task_type: task_type.to_string(),
            scheduled_at,
            message: message.to_string(),
            priority,
            status: FollowUpStatus::Pending,
            created_at: Utc::now(),
        };
        let task_id = task.id;

        ctx.follow_ups
            .insert(task)
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?;

        tracing::info!(
            tenant = %ctx.tenant_id,
            task_id = %task_id,
            delay_hours,
            "follow-up scheduled"
        );

        Ok(ToolOutput::json(json!({
            "task_id": task_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "status": "PENDING",
            "priority": args.get("priority").and_then(|v| v.as_str()).unwrap_or("normal"),
        })))
    }

    fn timeout_secs(&self) -> u64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StubMessagingGateway;
    use chatflow_core::conversation::ConversationContext;
    use chatflow_persistence::PersistenceLayer;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn ctx(layer: &PersistenceLayer) -> ToolContext {
        let conversation = Arc::new(Mutex::new(ConversationContext::new(
            Uuid::new_v4(),
            "tenant-1",
            "+5215550001",
        )));
        ToolContext::new(
            "tenant-1",
            conversation,
            layer.leads.clone(),
            layer.records.clone(),
            layer.follow_ups.clone(),
            layer.media.clone(),
            Arc::new(StubMessagingGateway::new()),
        )
    }

    #[tokio::test]
    async fn test_schedules_pending_task_at_expected_time() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        ScheduleFollowUpTool::new()
            .execute(json!({"delay_hours": 24, "message": "How did it go?"}), &ctx)
            .await
            .unwrap();

        let pending = layer.follow_ups.list_pending("tenant-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, FollowUpStatus::Pending);

        let expected = Utc::now() + Duration::hours(24);
        let drift = (pending[0].scheduled_at - expected).num_seconds().abs();
        assert!(drift < 5, "scheduled_at drifted {drift}s from now+24h");
    }

    #[tokio::test]
    async fn test_delay_bounds_enforced() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);
        let tool = ScheduleFollowUpTool::new();

        for delay in [0.0, 0.5, 721.0, -3.0] {
            let err = tool
                .execute(json!({"delay_hours": delay, "message": "x"}), &ctx)
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidParams(_)), "delay {delay}");
        }
        assert!(layer.follow_ups.list_pending("tenant-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        let err = ScheduleFollowUpTool::new()
            .execute(json!({"delay_hours": 24, "message": ""}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_fractional_delay_supported() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        ScheduleFollowUpTool::new()
            .execute(json!({"delay_hours": 1.5, "message": "ping", "priority": "high"}), &ctx)
            .await
            .unwrap();

        let pending = layer.follow_ups.list_pending("tenant-1").await.unwrap();
        assert_eq!(pending[0].priority, FollowUpPriority::High);
        let expected = Utc::now() + Duration::minutes(90);
        assert!((pending[0].scheduled_at - expected).num_seconds().abs() < 5);
    }
}
