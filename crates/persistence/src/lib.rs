//! Repositories for the chatflow engine
//!
//! One store trait per entity, with in-memory implementations. Stores are the
//! only mutation path for shared state; tool executors and the collaboration
//! state machine receive them as injected dependencies, which keeps the audit
//! trail authoritative and makes the whole engine testable without a
//! database.

pub mod conversations;
pub mod follow_ups;
pub mod leads;
pub mod media;
pub mod records;
pub mod takeover_log;

pub use conversations::{ConversationStore, InMemoryConversationStore};
pub use follow_ups::{FollowUpStore, InMemoryFollowUpStore};
pub use leads::{InMemoryLeadStore, LeadStore};
pub use media::{InMemoryMediaAssetStore, MediaAsset, MediaAssetStore};
pub use records::{InMemoryRecordStore, RecordStore};
pub use takeover_log::{InMemoryTakeoverLogStore, TakeoverLogStore};

use std::sync::Arc;
use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Bundle of every store the engine needs
#[derive(Clone)]
pub struct PersistenceLayer {
    pub conversations: Arc<dyn ConversationStore>,
    pub leads: Arc<dyn LeadStore>,
    pub records: Arc<dyn RecordStore>,
    pub follow_ups: Arc<dyn FollowUpStore>,
    pub media: Arc<dyn MediaAssetStore>,
    pub takeovers: Arc<dyn TakeoverLogStore>,
}

impl PersistenceLayer {
    /// All-in-memory layer, used in tests and single-node deployments
    pub fn in_memory() -> Self {
        Self {
            conversations: Arc::new(InMemoryConversationStore::new()),
            leads: Arc::new(InMemoryLeadStore::new()),
            records: Arc::new(InMemoryRecordStore::new()),
            follow_ups: Arc::new(InMemoryFollowUpStore::new()),
            media: Arc::new(InMemoryMediaAssetStore::new()),
            takeovers: Arc::new(InMemoryTakeoverLogStore::new()),
        }
    }
}
