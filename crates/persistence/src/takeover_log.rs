//! Takeover audit log persistence
//!
//! Append-only; entries are immutable once written. The metrics aggregator
//! reads this log concurrently with live traffic, so reads take a shared
//! lock only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use chatflow_core::conversation::TakeoverLogEntry;

use crate::PersistenceError;

/// Takeover log store trait
#[async_trait]
pub trait TakeoverLogStore: Send + Sync {
    /// Append an entry; the log never mutates in place
    async fn append(&self, entry: TakeoverLogEntry) -> Result<(), PersistenceError>;

    /// Entries for one conversation, in append order
    async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<TakeoverLogEntry>, PersistenceError>;

    /// Entries with `timestamp >= since`, in append order
    async fn list_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TakeoverLogEntry>, PersistenceError>;
}

/// In-memory takeover log
pub struct InMemoryTakeoverLogStore {
    inner: RwLock<Vec<TakeoverLogEntry>>,
}

impl InMemoryTakeoverLogStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryTakeoverLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TakeoverLogStore for InMemoryTakeoverLogStore {
    async fn append(&self, entry: TakeoverLogEntry) -> Result<(), PersistenceError> {
        self.inner.write().push(entry);
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<TakeoverLogEntry>, PersistenceError> {
        Ok(self
            .inner
            .read()
            .iter()
            .filter(|e| e.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn list_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TakeoverLogEntry>, PersistenceError> {
        Ok(self
            .inner
            .read()
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect())
    }
}
