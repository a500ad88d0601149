//! Conversation persistence

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use chatflow_core::conversation::ConversationContext;

use crate::PersistenceError;

/// Conversation store trait
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ConversationContext>, PersistenceError>;

    /// Insert or replace the conversation snapshot
    async fn upsert(&self, conversation: ConversationContext) -> Result<(), PersistenceError>;

    /// All conversations for a tenant (empty tenant id means all tenants)
    async fn list(&self, tenant_id: &str) -> Result<Vec<ConversationContext>, PersistenceError>;
}

/// In-memory conversation store
pub struct InMemoryConversationStore {
    inner: DashMap<Uuid, ConversationContext>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, id: Uuid) -> Result<Option<ConversationContext>, PersistenceError> {
        Ok(self.inner.get(&id).map(|c| c.clone()))
    }

    async fn upsert(&self, conversation: ConversationContext) -> Result<(), PersistenceError> {
        self.inner.insert(conversation.id, conversation);
        Ok(())
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<ConversationContext>, PersistenceError> {
        Ok(self
            .inner
            .iter()
            .filter(|c| tenant_id.is_empty() || c.tenant_id == tenant_id)
            .map(|c| c.clone())
            .collect())
    }
}
