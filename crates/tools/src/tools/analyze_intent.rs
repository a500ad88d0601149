//! Customer intent scoring tool
//!
//! Writes the model's intent analysis onto the lead and the conversation
//! metadata. Bounds are checked before any mutation; tags only ever grow.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::schema::{
    InputSchema, PropertySchema, SideEffect, Tool, ToolContext, ToolError, ToolOutput, ToolSchema,
};

pub struct AnalyzeCustomerIntentTool;

impl AnalyzeCustomerIntentTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnalyzeCustomerIntentTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AnalyzeCustomerIntentTool {
    fn name(&self) -> &str {
        "analyze_customer_intent"
    }

    fn description(&self) -> &str {
        "Record the customer's detected intent, confidence, qualification score and tags"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property(
                    "intent",
                    PropertySchema::string("Detected intent, e.g. 'purchase', 'pricing', 'support'"),
                    true,
                )
                .property(
                    "confidence",
                    PropertySchema::number("Confidence in the detected intent").with_range(0.0, 1.0),
                    true,
                )
                .property(
                    "qualification_score",
                    PropertySchema::number("Lead qualification score").with_range(0.0, 100.0),
                    false,
                )
                .property(
                    "tags",
                    PropertySchema::string_array("Tags to add to the lead (existing tags are kept)"),
                    false,
                )
                .property(
                    "business_type",
                    PropertySchema::string("Detected business vertical of the customer's request"),
                    false,
                )
                .build(),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::LeadMutation
    }

    fn required_context(&self) -> &[&str] {
        &["tenant_id", "customer_phone"]
    }

    fn validate(&self, args: &Value) -> Result<(), ToolError> {
        if args.get("intent").and_then(|v| v.as_str()).is_none() {
            return Err(ToolError::invalid_params("intent is required"));
        }

        let confidence = args
            .get("confidence")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ToolError::invalid_params("confidence is required"))?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ToolError::invalid_params(format!(
                "confidence must be within [0, 1], got {confidence}"
            )));
        }

        if let Some(score) = args.get("qualification_score") {
            let score = score
                .as_f64()
                .ok_or_else(|| ToolError::invalid_params("qualification_score must be a number"))?;
            if !(0.0..=100.0).contains(&score) {
                return Err(ToolError::invalid_params(format!(
                    "qualification_score must be within [0, 100], got {score}"
                )));
            }
        }

        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        // All bounds are enforced before the first store write
        self.validate(&args)?;

        let intent = args
            .get("intent")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::invalid_params("intent is required"))?;
        let confidence = args
            .get("confidence")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ToolError::invalid_params("confidence is required"))?;
        let qualification_score = args
            .get("qualification_score")
            .and_then(|v| v.as_f64())
            .map(|s| s.round() as u8);
        let tags: Vec<String> = args
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let business_type = args.get("business_type").and_then(|v| v.as_str());

        let phone = ctx.conversation.lock().customer_phone.clone();

        let mut lead = ctx
            .leads
            .get_or_create(&ctx.tenant_id, &phone)
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?;

        lead.add_tags(tags.iter().cloned());
        lead.last_intent = Some(intent.to_string());
        lead.intent_confidence = Some(confidence);
        if let Some(score) = qualification_score {
            lead.qualification_score = score;
        }
        if let Some(bt) = business_type {
            lead.business_type = Some(bt.to_string());
        }
        lead.updated_at = Utc::now();
        let lead_id = lead.id;
        let tag_count = lead.tags.len();

        ctx.leads
            .upsert(lead)
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?;

        {
            let mut conversation = ctx.conversation.lock();
            conversation.metadata.last_intent = Some(intent.to_string());
            conversation.metadata.intent_confidence = Some(confidence);
            if let Some(score) = qualification_score {
                conversation.metadata.qualification_score = Some(score);
            }
            if conversation.customer_lead_id.is_none() {
                conversation.customer_lead_id = Some(lead_id);
            }
        }

        tracing::info!(
            tenant = %ctx.tenant_id,
            intent = %intent,
            confidence,
            tags = tag_count,
            "customer intent recorded"
        );

        Ok(ToolOutput::json(json!({
            "lead_id": lead_id,
            "intent": intent,
            "confidence": confidence,
            "qualification_score": qualification_score,
            "tag_count": tag_count,
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
    use uuid::Uuid;

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
    async fn test_out_of_range_confidence_rejected_before_mutation() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        let err = AnalyzeCustomerIntentTool::new()
            .execute(json!({"intent": "purchase", "confidence": 1.5}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidParams(_)));
        assert!(layer
            .leads
            .find_by_phone("tenant-1", "+5215550001")
            .await
            .unwrap()
            .is_none());
        assert!(ctx.conversation.lock().metadata.last_intent.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_score_rejected() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        let err = AnalyzeCustomerIntentTool::new()
            .execute(
                json!({"intent": "purchase", "confidence": 0.9, "qualification_score": 150}),
                &ctx,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_tags_union_across_calls() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);
        let tool = AnalyzeCustomerIntentTool::new();

        tool.execute(
            json!({"intent": "pricing", "confidence": 0.8, "tags": ["a"]}),
            &ctx,
        )
        .await
        .unwrap();
        tool.execute(
            json!({"intent": "purchase", "confidence": 0.9, "tags": ["b"]}),
            &ctx,
        )
        .await
        .unwrap();

        let lead = layer
            .leads
            .find_by_phone("tenant-1", "+5215550001")
            .await
            .unwrap()
            .unwrap();
        let tags: Vec<&str> = lead.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert_eq!(lead.last_intent.as_deref(), Some("purchase"));
    }

    #[tokio::test]
    async fn test_updates_conversation_metadata() {
        let layer = PersistenceLayer::in_memory();
        let ctx = ctx(&layer);

        AnalyzeCustomerIntentTool::new()
            .execute(
                json!({"intent": "support", "confidence": 0.7, "qualification_score": 40}),
                &ctx,
            )
            .await
            .unwrap();

        let conversation = ctx.conversation.lock();
        assert_eq!(conversation.metadata.last_intent.as_deref(), Some("support"));
        assert_eq!(conversation.metadata.intent_confidence, Some(0.7));
        assert_eq!(conversation.metadata.qualification_score, Some(40));
    }
}
