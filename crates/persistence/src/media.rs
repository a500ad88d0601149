//! Stored media assets
//!
//! Assets are addressed by (tenant, purpose) - e.g. the restaurant tenant's
//! "menu" asset - so the send_multimedia executor never handles raw URLs from
//! the model.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PersistenceError;

/// A media asset uploaded by the tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub tenant_id: String,
    /// Logical purpose: "menu", "catalog", "price_list", ...
    pub purpose: String,
    pub url: String,
    pub caption: Option<String>,
    pub mime_type: String,
}

impl MediaAsset {
    pub fn new(
        tenant_id: impl Into<String>,
        purpose: impl Into<String>,
        url: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            purpose: purpose.into(),
            url: url.into(),
            caption: None,
            mime_type: mime_type.into(),
        }
    }
}

/// Media asset store trait
#[async_trait]
pub trait MediaAssetStore: Send + Sync {
    async fn get(
        &self,
        tenant_id: &str,
        purpose: &str,
    ) -> Result<Option<MediaAsset>, PersistenceError>;

    async fn upsert(&self, asset: MediaAsset) -> Result<(), PersistenceError>;
}

/// In-memory media asset store keyed by (tenant, purpose)
pub struct InMemoryMediaAssetStore {
    inner: DashMap<(String, String), MediaAsset>,
}

impl InMemoryMediaAssetStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl Default for InMemoryMediaAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaAssetStore for InMemoryMediaAssetStore {
    async fn get(
        &self,
        tenant_id: &str,
        purpose: &str,
    ) -> Result<Option<MediaAsset>, PersistenceError> {
        Ok(self
            .inner
            .get(&(tenant_id.to_string(), purpose.to_string()))
            .map(|a| a.clone()))
    }

    async fn upsert(&self, asset: MediaAsset) -> Result<(), PersistenceError> {
        self.inner
            .insert((asset.tenant_id.clone(), asset.purpose.clone()), asset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyed_by_tenant_and_purpose() {
        let store = InMemoryMediaAssetStore::new();
        store
            .upsert(MediaAsset::new(
                "resto",
                "menu",
                "https://cdn.example/menu.pdf",
                "application/pdf",
            ))
            .await
            .unwrap();

        assert!(store.get("resto", "menu").await.unwrap().is_some());
        assert!(store.get("resto", "catalog").await.unwrap().is_none());
        assert!(store.get("other", "menu").await.unwrap().is_none());
    }
}
