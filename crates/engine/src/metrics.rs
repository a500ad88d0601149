//! Metrics aggregator
//!
//! Read-only analytics over the takeover audit log and conversation
//! outcomes. Runs concurrently with live traffic; it only ever reads.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chatflow_core::conversation::{ConversationOutcome, TakeoverEventType, TakeoverLogEntry};
use chatflow_persistence::{ConversationStore, TakeoverLogStore};

use crate::EngineError;

/// Reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(Self::Day),
            "7d" => Some(Self::Week),
            "30d" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }
}

/// Leaderboard score weights; must sum to 1
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub efficiency: f64,
    pub resolution: f64,
    pub escalation: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            efficiency: 0.3,
            resolution: 0.4,
            escalation: 0.3,
        }
    }
}

/// Composite collaboration score
///
/// `w1·efficiency + w2·resolution + w3·(1 − escalation)`. Monotone
/// non-decreasing in resolution rate and non-increasing in escalation rate
/// for fixed efficiency.
pub fn collaboration_score(
    weights: &ScoreWeights,
    tool_assist_efficiency: f64,
    resolution_rate: f64,
    escalation_rate: f64,
) -> f64 {
    weights.efficiency * tool_assist_efficiency
        + weights.resolution * resolution_rate
        + weights.escalation * (1.0 - escalation_rate)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_conversations: usize,
    pub takeover_requests: usize,
    pub takeovers_started: usize,
    pub takeovers_ended: usize,
    pub ai_suggestions: usize,
    pub resolution_rate: f64,
    pub escalation_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Efficiency {
    pub avg_takeover_duration_secs: f64,
    pub avg_suggestions_per_takeover: f64,
    pub tool_assist_efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patterns {
    /// Takeover-request counts by hour of day (0-23)
    pub hourly_distribution: Vec<u32>,
    pub busiest_hour: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantScore {
    pub tenant_id: String,
    pub collaboration_score: f64,
    pub tool_assist_efficiency: f64,
    pub resolution_rate: f64,
    pub escalation_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    /// (day, takeovers started) pairs, oldest first
    pub daily_takeovers: Vec<(String, u32)>,
}

/// Analytics report for one time window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub time_range: String,
    pub overview: Overview,
    pub efficiency: Efficiency,
    pub patterns: Patterns,
    /// Per-tenant leaderboard, best score first
    pub performance: Vec<TenantScore>,
    pub trends: Trends,
    pub generated_at: DateTime<Utc>,
}

/// Read-only analytics over takeover logs and conversation outcomes
pub struct MetricsAggregator {
    takeovers: Arc<dyn TakeoverLogStore>,
    conversations: Arc<dyn ConversationStore>,
    weights: ScoreWeights,
}

impl MetricsAggregator {
    pub fn new(
        takeovers: Arc<dyn TakeoverLogStore>,
        conversations: Arc<dyn ConversationStore>,
        weights: ScoreWeights,
    ) -> Self {
        Self {
            takeovers,
            conversations,
            weights,
        }
    }

    pub async fn report(&self, range: TimeRange) -> Result<AnalyticsReport, EngineError> {
        let since = Utc::now() - range.duration();
        let entries = self.takeovers.list_since(since).await?;
        let conversations = self.conversations.list("").await?;

        let in_window: Vec<_> = conversations
            .iter()
            .filter(|c| c.updated_at >= since)
            .collect();

        let count_of = |ty: TakeoverEventType| entries.iter().filter(|e| e.event_type == ty).count();
        let requests = count_of(TakeoverEventType::Requested);
        let started = count_of(TakeoverEventType::Started);
        let ended = count_of(TakeoverEventType::Ended);
        let suggestions = count_of(TakeoverEventType::AiSuggestion);

        let total = in_window.len();
        let resolved = in_window
            .iter()
            .filter(|c| c.outcome == ConversationOutcome::Resolved)
            .count();
        let escalated = in_window.iter().filter(|c| c.escalation_level > 0).count();
        let resolution_rate = ratio(resolved, total);
        let escalation_rate = ratio(escalated, total);

        let durations = takeover_durations(&entries);
        let avg_takeover_duration_secs = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let tool_assist_efficiency = assisted_takeover_fraction(&entries);

        let mut hourly = vec![0u32; 24];
        for entry in entries
            .iter()
            .filter(|e| e.event_type == TakeoverEventType::Requested)
        {
            hourly[entry.timestamp.hour() as usize] += 1;
        }
        let busiest_hour = hourly
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .max_by_key(|(_, count)| **count)
            .map(|(hour, _)| hour as u8);

        let performance = self.leaderboard(&entries, &in_window);

        let mut daily: HashMap<String, u32> = HashMap::new();
        for entry in entries
            .iter()
            .filter(|e| e.event_type == TakeoverEventType::Started)
        {
            *daily
                .entry(entry.timestamp.format("%Y-%m-%d").to_string())
                .or_default() += 1;
        }
        let mut daily_takeovers: Vec<(String, u32)> = daily.into_iter().collect();
        daily_takeovers.sort();

        Ok(AnalyticsReport {
            time_range: range.as_str().to_string(),
            overview: Overview {
                total_conversations: total,
                takeover_requests: requests,
                takeovers_started: started,
                takeovers_ended: ended,
                ai_suggestions: suggestions,
                resolution_rate,
                escalation_rate,
            },
            efficiency: Efficiency {
                avg_takeover_duration_secs,
                avg_suggestions_per_takeover: if started == 0 {
                    0.0
                } else {
                    suggestions as f64 / started as f64
                },
                tool_assist_efficiency,
            },
            patterns: Patterns {
                hourly_distribution: hourly,
                busiest_hour,
            },
            performance,
            trends: Trends { daily_takeovers },
            generated_at: Utc::now(),
        })
    }

    fn leaderboard(
        &self,
        entries: &[TakeoverLogEntry],
        conversations: &[&chatflow_core::conversation::ConversationContext],
    ) -> Vec<TenantScore> {
        let mut tenants: Vec<String> = conversations
            .iter()
            .map(|c| c.tenant_id.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        tenants.sort();

        let mut scores: Vec<TenantScore> = tenants
            .into_iter()
            .map(|tenant_id| {
                let tenant_convs: Vec<_> = conversations
                    .iter()
                    .filter(|c| c.tenant_id == tenant_id)
                    .collect();
                let tenant_entries: Vec<TakeoverLogEntry> = entries
                    .iter()
                    .filter(|e| e.tenant_id == tenant_id)
                    .cloned()
                    .collect();

                let total = tenant_convs.len();
                let resolved = tenant_convs
                    .iter()
                    .filter(|c| c.outcome == ConversationOutcome::Resolved)
                    .count();
                let escalated = tenant_convs
                    .iter()
                    .filter(|c| c.escalation_level > 0)
                    .count();

                let resolution_rate = ratio(resolved, total);
                let escalation_rate = ratio(escalated, total);
                let efficiency = assisted_takeover_fraction(&tenant_entries);

                TenantScore {
                    collaboration_score: collaboration_score(
                        &self.weights,
                        efficiency,
                        resolution_rate,
                        escalation_rate,
                    ),
                    tenant_id,
                    tool_assist_efficiency: efficiency,
                    resolution_rate,
                    escalation_rate,
                }
            })
            .collect();

        scores.sort_by(|a, b| {
            b.collaboration_score
                .partial_cmp(&a.collaboration_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scores
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Durations of completed takeovers, pairing started/ended per conversation
fn takeover_durations(entries: &[TakeoverLogEntry]) -> Vec<f64> {
    let mut open: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
    let mut durations = Vec::new();

    for entry in entries {
        match entry.event_type {
            TakeoverEventType::Started => {
                open.entry(entry.conversation_id).or_insert(entry.timestamp);
            }
            TakeoverEventType::Ended => {
                if let Some(started_at) = open.remove(&entry.conversation_id) {
                    let secs = (entry.timestamp - started_at).num_milliseconds() as f64 / 1000.0;
                    if secs >= 0.0 {
                        durations.push(secs);
                    }
                }
            }
            _ => {}
        }
    }
    durations
}

/// Fraction of takeovers that got at least one AI suggestion
fn assisted_takeover_fraction(entries: &[TakeoverLogEntry]) -> f64 {
    let mut started: HashMap<Uuid, bool> = HashMap::new();
    for entry in entries {
        match entry.event_type {
            TakeoverEventType::Started => {
                started.entry(entry.conversation_id).or_insert(false);
            }
            TakeoverEventType::AiSuggestion => {
                if let Some(assisted) = started.get_mut(&entry.conversation_id) {
                    *assisted = true;
                }
            }
            _ => {}
        }
    }
    if started.is_empty() {
        return 0.0;
    }
    let assisted = started.values().filter(|a| **a).count();
    assisted as f64 / started.len() as f64
}
