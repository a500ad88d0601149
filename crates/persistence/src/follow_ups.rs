//! Follow-up task persistence

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use chatflow_core::lead::{FollowUpStatus, FollowUpTask};

use crate::PersistenceError;

/// Follow-up task store trait
#[async_trait]
pub trait FollowUpStore: Send + Sync {
    async fn insert(&self, task: FollowUpTask) -> Result<(), PersistenceError>;

    async fn get(&self, id: Uuid) -> Result<Option<FollowUpTask>, PersistenceError>;

    async fn list_pending(&self, tenant_id: &str) -> Result<Vec<FollowUpTask>, PersistenceError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: FollowUpStatus,
    ) -> Result<(), PersistenceError>;
}

/// In-memory follow-up store
pub struct InMemoryFollowUpStore {
    inner: DashMap<Uuid, FollowUpTask>,
}

impl InMemoryFollowUpStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl Default for InMemoryFollowUpStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FollowUpStore for InMemoryFollowUpStore {
    async fn insert(&self, task: FollowUpTask) -> Result<(), PersistenceError> {
        self.inner.insert(task.id, task);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FollowUpTask>, PersistenceError> {
        Ok(self.inner.get(&id).map(|t| t.clone()))
    }

    async fn list_pending(&self, tenant_id: &str) -> Result<Vec<FollowUpTask>, PersistenceError> {
        let mut tasks: Vec<FollowUpTask> = self
            .inner
            .iter()
            .filter(|t| t.tenant_id == tenant_id && t.status == FollowUpStatus::Pending)
            .map(|t| t.clone())
            .collect();
        tasks.sort_by_key(|t| t.scheduled_at);
        Ok(tasks)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: FollowUpStatus,
    ) -> Result<(), PersistenceError> {
        let mut task = self
            .inner
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::NotFound(format!("follow-up task {id}")))?;
        task.status = status;
        Ok(())
    }
}
