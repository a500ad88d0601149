//! Business data capture tool
//!
//! Persists a typed business record extracted from the conversation and
//! optionally patches the lead's contact details.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use chatflow_core::lead::{BusinessRecord, BusinessRecordType};

use crate::schema::{
    InputSchema, PropertySchema, SideEffect, Tool, ToolContext, ToolError, ToolOutput, ToolSchema,
};

pub struct SaveConversationDataTool;

impl SaveConversationDataTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SaveConversationDataTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SaveConversationDataTool {
    fn name(&self) -> &str {
        "save_conversation_data"
    }

    fn description(&self) -> &str {
        "Save structured business data captured during the conversation \
         (orders, appointments, inquiries, leads, complaints, feedback)"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property(
                    "data_type",
                    PropertySchema::enum_type(
                        "Kind of record being saved",
                        vec![
                            "order".into(),
                            "appointment".into(),
                            "inquiry".into(),
                            "lead".into(),
                            "complaint".into(),
                            "feedback".into(),
                        ],
                    ),
                    true,
                )
                .property(
                    "data",
                    PropertySchema::object("Structured payload for the record"),
                    true,
                )
                .property(
                    "customer_name",
                    PropertySchema::string("Customer name, if mentioned"),
                    false,
                )
                .property(
                    "customer_email",
                    PropertySchema::string("Customer email, if mentioned"),
                    false,
                )
                .property(
                    "follow_up_required",
                    PropertySchema::boolean("Whether this record needs a follow-up")
                        .with_default(json!(false)),
                    false,
                )
                .build(),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Persistence
    }

    fn required_context(&self) -> &[&str] {
        &["tenant_id", "customer_phone"]
    }

    fn validate(&self, args: &Value) -> Result<(), ToolError> {
        let data_type = args
            .get("data_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::invalid_params("data_type is required"))?;
        if BusinessRecordType::parse(data_type).is_none() {
            return Err(ToolError::invalid_params(format!(
                "unknown data_type '{data_type}'"
            )));
        }
        if !args.get("data").map(Value::is_object).unwrap_or(false) {
            return Err(ToolError::invalid_params("data must be an object"));
        }
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        self.validate(&args)?;

        let record_type = args
            .get("data_type")
            .and_then(|v| v.as_str())
            .and_then(BusinessRecordType::parse)
            .ok_or_else(|| ToolError::invalid_params("data_type is required"))?;
        let payload = args.get("data").cloned().unwrap_or_else(|| json!({}));
        let follow_up_required = args
            .get("follow_up_required")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let (conversation_id, phone) = {
            let conversation = ctx.conversation.lock();
            (conversation.id, conversation.customer_phone.clone())
        };

        let mut lead = ctx
            .leads
            .get_or_create(&ctx.tenant_id, &phone)
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?;

        if let Some(name) = args.get("customer_name").and_then(|v| v.as_str()) {
            lead.name = Some(name.to_string());
        }
        if let Some(email) = args.get("customer_email").and_then(|v| v.as_str()) {
            lead.email = Some(email.to_string());
        }
        lead.updated_at = Utc::now();
        let lead_id = lead.id;
        ctx.leads
            .upsert(lead)
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?;

        let record = BusinessRecord {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id.clone(),
            conversation_id,
            lead_id: Some(lead_id),
            record_type,
            payload,
            follow_up_required,
            created_at: Utc::now(),
        };
        let record_id = record.id;
        ctx.records
            .insert(record)
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?;

        {
            let mut conversation = ctx.conversation.lock();
            if conversation.customer_lead_id.is_none() {
                conversation.customer_lead_id = Some(lead_id);
            }
        }

        tracing::info!(
            tenant = %ctx.tenant_id,
            record_type = record_type.as_str(),
            record_id = %record_id,
            follow_up = follow_up_required,
            "business record saved"
        );

        Ok(ToolOutput::json(json!({
            "record_id": record_id,
            "data_type": record_type.as_str(),
            "lead_id": lead_id,
            "follow_up_required": follow_up_required,
        })))
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
    async fn test_invalid_data_type_leaves_state_unchanged() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        let err = SaveConversationDataTool::new()
            .execute(
                json!({"data_type": "refund", "data": {"amount": 10}}),
                &ctx,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidParams(_)));
        assert_eq!(layer.records.count().await.unwrap(), 0);
        assert!(layer
            .leads
            .find_by_phone("tenant-1", "+5215550001")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_saves_record_and_patches_lead() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        let out = SaveConversationDataTool::new()
            .execute(
                json!({
                    "data_type": "order",
                    "data": {"item": "pizza margarita", "qty": 2},
                    "customer_name": "Ana Torres",
                    "customer_email": "ana@example.com",
                    "follow_up_required": true,
                }),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(out.payload["data_type"], "order");
        assert_eq!(layer.records.count().await.unwrap(), 1);

        let lead = layer
            .leads
            .find_by_phone("tenant-1", "+5215550001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lead.name.as_deref(), Some("Ana Torres"));
        assert_eq!(lead.email.as_deref(), Some("ana@example.com"));

        // Conversation linked to the lead
        assert_eq!(ctx.conversation.lock().customer_lead_id, Some(lead.id));
    }

    #[tokio::test]
    async fn test_missing_data_object_rejected() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        let err = SaveConversationDataTool::new()
            .execute(json!({"data_type": "inquiry"}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
