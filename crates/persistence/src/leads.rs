//! Lead persistence

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use chatflow_core::lead::CustomerLead;

use crate::PersistenceError;

/// Lead store trait
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<CustomerLead>, PersistenceError>;

    async fn find_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<CustomerLead>, PersistenceError>;

    async fn upsert(&self, lead: CustomerLead) -> Result<(), PersistenceError>;

    /// Fetch the lead for (tenant, phone), creating an empty one if absent
    async fn get_or_create(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<CustomerLead, PersistenceError>;
}

/// In-memory lead store
pub struct InMemoryLeadStore {
    inner: DashMap<Uuid, CustomerLead>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl Default for InMemoryLeadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn get(&self, id: Uuid) -> Result<Option<CustomerLead>, PersistenceError> {
        Ok(self.inner.get(&id).map(|l| l.clone()))
    }

    async fn find_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<CustomerLead>, PersistenceError> {
        Ok(self
            .inner
            .iter()
            .find(|l| l.tenant_id == tenant_id && l.phone == phone)
            .map(|l| l.clone()))
    }

    async fn upsert(&self, lead: CustomerLead) -> Result<(), PersistenceError> {
        self.inner.insert(lead.id, lead);
        Ok(())
    }

    async fn get_or_create(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<CustomerLead, PersistenceError> {
        if let Some(existing) = self.find_by_phone(tenant_id, phone).await? {
            return Ok(existing);
        }
        let lead = CustomerLead::new(tenant_id, phone);
        self.inner.insert(lead.id, lead.clone());
        Ok(lead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = InMemoryLeadStore::new();
        let first = store.get_or_create("t", "+5215550001").await.unwrap();
        let second = store.get_or_create("t", "+5215550001").await.unwrap();
        assert_eq!(first.id, second.id);

        let other_tenant = store.get_or_create("u", "+5215550001").await.unwrap();
        assert_ne!(first.id, other_tenant.id);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = InMemoryLeadStore::new();
        let mut lead = store.get_or_create("t", "+5215550001").await.unwrap();
        lead.qualification_score = 80;
        store.upsert(lead.clone()).await.unwrap();

        let loaded = store.get(lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.qualification_score, 80);
    }
}
