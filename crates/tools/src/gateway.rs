//! Outbound messaging gateway
//!
//! Trait and stub for the WhatsApp provider integration. The real
//! implementation lives with the deployment; the engine only ever sees this
//! trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::schema::ToolError;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("send timed out")]
    Timeout,
}

impl From<GatewayError> for ToolError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(msg) => ToolError::invalid_params(msg),
            other => ToolError::External(other.to_string()),
        }
    }
}

/// Outbound messaging gateway trait
///
/// Implement against the actual WhatsApp provider. `send` returns the
/// provider message id.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send(
        &self,
        to_phone: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<String, GatewayError>;
}

/// A message recorded by the stub gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: String,
    pub to_phone: String,
    pub body: String,
    pub media_url: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Stub gateway for development and tests
///
/// Records every send; can be told to fail the next call to exercise
/// partial-failure paths.
pub struct StubMessagingGateway {
    sent: Mutex<Vec<SentMessage>>,
    fail_next: Mutex<Option<GatewayError>>,
}

impl StubMessagingGateway {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    /// Make the next send fail with the given error
    pub fn fail_next(&self, error: GatewayError) {
        *self.fail_next.lock() = Some(error);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Default for StubMessagingGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingGateway for StubMessagingGateway {
    async fn send(
        &self,
        to_phone: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<String, GatewayError> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }

        let message_id = format!("wamid.{}", Uuid::new_v4().simple());
        self.sent.lock().push(SentMessage {
            message_id: message_id.clone(),
            to_phone: to_phone.to_string(),
            body: body.to_string(),
            media_url: media_url.map(String::from),
            sent_at: Utc::now(),
        });

        tracing::debug!(to = %to_phone, media = media_url.is_some(), "stub gateway send");
        Ok(message_id)
    }
}
