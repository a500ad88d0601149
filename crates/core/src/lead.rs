//! CRM entities: leads, business records and follow-up tasks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Customer lead, scoped to a tenant
///
/// Tags grow by union only; executors never replace the existing set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerLead {
    pub id: Uuid,
    pub tenant_id: String,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Qualification score, within [0, 100]
    pub qualification_score: u8,
    pub tags: BTreeSet<String>,
    pub last_intent: Option<String>,
    pub intent_confidence: Option<f64>,
    pub business_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerLead {
    pub fn new(tenant_id: impl Into<String>, phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            phone: phone.into(),
            name: None,
            email: None,
            qualification_score: 0,
            tags: BTreeSet::new(),
            last_intent: None,
            intent_confidence: None,
            business_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Union new tags into the existing set
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self.updated_at = Utc::now();
    }
}

/// Structured data type captured from a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessRecordType {
    Order,
    Appointment,
    Inquiry,
    Lead,
    Complaint,
    Feedback,
}

impl BusinessRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Appointment => "appointment",
            Self::Inquiry => "inquiry",
            Self::Lead => "lead",
            Self::Complaint => "complaint",
            Self::Feedback => "feedback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "order" => Some(Self::Order),
            "appointment" => Some(Self::Appointment),
            "inquiry" => Some(Self::Inquiry),
            "lead" => Some(Self::Lead),
            "complaint" => Some(Self::Complaint),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// Persisted output of save_conversation_data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub conversation_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub record_type: BusinessRecordType,
    pub payload: serde_json::Value,
    pub follow_up_required: bool,
    pub created_at: DateTime<Utc>,
}

/// Follow-up task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Follow-up task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowUpStatus {
    #[default]
    Pending,
    Done,
    Cancelled,
}

/// Scheduled follow-up created by schedule_follow_up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpTask {
    pub id: Uuid,
    pub tenant_id: String,
    pub conversation_id: Uuid,
    pub task_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub message: String,
    pub priority: FollowUpPriority,
    pub status: FollowUpStatus,
    pub created_at: DateTime<Utc>,
}
