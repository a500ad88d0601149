//! Business record persistence

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use chatflow_core::lead::BusinessRecord;

use crate::PersistenceError;

/// Business record store trait
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: BusinessRecord) -> Result<(), PersistenceError>;

    async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<BusinessRecord>, PersistenceError>;

    async fn count(&self) -> Result<usize, PersistenceError>;
}

/// In-memory record store (append-only, insertion order preserved)
pub struct InMemoryRecordStore {
    inner: RwLock<Vec<BusinessRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: BusinessRecord) -> Result<(), PersistenceError> {
        self.inner.write().push(record);
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<BusinessRecord>, PersistenceError> {
        Ok(self
            .inner
            .read()
            .iter()
            .filter(|r| r.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.inner.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::lead::BusinessRecordType;
    use chrono::Utc;

    fn record(conversation_id: Uuid) -> BusinessRecord {
        BusinessRecord {
            id: Uuid::new_v4(),
            tenant_id: "t".into(),
            conversation_id,
            lead_id: None,
            record_type: BusinessRecordType::Inquiry,
            payload: serde_json::json!({"topic": "pricing"}),
            follow_up_required: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = InMemoryRecordStore::new();
        let conv = Uuid::new_v4();
        store.insert(record(conv)).await.unwrap();
        store.insert(record(conv)).await.unwrap();
        store.insert(record(Uuid::new_v4())).await.unwrap();

        assert_eq!(store.list_for_conversation(conv).await.unwrap().len(), 2);
        assert_eq!(store.count().await.unwrap(), 3);
    }
}
