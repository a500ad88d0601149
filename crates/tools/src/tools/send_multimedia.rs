//! Multimedia delivery tool
//!
//! Resolves a stored media asset by (tenant, purpose) and sends it through
//! the messaging gateway. The model never supplies raw URLs.

use async_trait::async_trait;
use serde_json::{json, Value};

use chatflow_core::conversation::{MessageEntry, ToolMeta};

use crate::schema::{
    InputSchema, PropertySchema, SideEffect, Tool, ToolContext, ToolError, ToolOutput, ToolSchema,
};

pub struct SendMultimediaTool;

impl SendMultimediaTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SendMultimediaTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SendMultimediaTool {
    fn name(&self) -> &str {
        "send_multimedia"
    }

    fn description(&self) -> &str {
        "Send a stored media file (menu, catalog, price list, brochure) to the customer"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property(
                    "media_purpose",
                    PropertySchema::enum_type(
                        "Which stored asset to send",
                        vec![
                            "menu".into(),
                            "catalog".into(),
                            "price_list".into(),
                            "brochure".into(),
                            "location".into(),
                        ],
                    ),
                    true,
                )
                .property(
                    "caption",
                    PropertySchema::string("Caption sent with the media (optional)"),
                    false,
                )
                .build(),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::OutboundMessage
    }

    fn required_context(&self) -> &[&str] {
        &["customer_phone", "tenant_id"]
    }

    fn validate(&self, args: &Value) -> Result<(), ToolError> {
        match args.get("media_purpose").and_then(|v| v.as_str()) {
            Some(p) if !p.is_empty() => Ok(()),
            _ => Err(ToolError::invalid_params("media_purpose is required")),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let purpose = args
            .get("media_purpose")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::invalid_params("media_purpose is required"))?;
        let caption = args.get("caption").and_then(|v| v.as_str());

        // Identical media already went out this turn; don't resend
        if ctx.media_already_sent(purpose) {
            return Ok(ToolOutput::json(json!({
                "status": "already_sent",
                "media_purpose": purpose,
            })));
        }

        let phone = ctx.conversation.lock().customer_phone.clone();

        let asset = ctx
            .media
            .get(&ctx.tenant_id, purpose)
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?
            .ok_or_else(|| ToolError::not_found(format!("No {purpose} file found")))?;

        let body = caption
            .map(String::from)
            .or_else(|| asset.caption.clone())
            .unwrap_or_else(|| format!("Here is our {purpose}"));

        let message_id = ctx
            .gateway
            .send(&phone, &body, Some(&asset.url))
            .await
            .map_err(ToolError::from)?;

        ctx.mark_media_sent(purpose);

        let invocation_id = ctx.invocation_id();
        {
            let mut conversation = ctx.conversation.lock();
            conversation.push(MessageEntry::tool(
                format!("[media:{purpose}] {body}"),
                ToolMeta {
                    invocation_id: invocation_id.clone(),
                    tool_name: self.name().to_string(),
                    success: true,
                },
            ));
        }

        tracing::info!(
            tenant = %ctx.tenant_id,
            purpose = %purpose,
            message_id = %message_id,
            "media sent"
        );

        Ok(ToolOutput::json(json!({
            "status": "sent",
            "media_purpose": purpose,
            "media_url": asset.url,
            "message_id": message_id,
        })))
    }

    fn timeout_secs(&self) -> u64 {
        15
    }
}
