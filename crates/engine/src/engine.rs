//! Engine facade
//!
//! Serializes all work per conversation id, gates the customer-facing AI
//! path on the collaboration mode, and exposes the control, status and
//! analytics APIs the transports call into.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chatflow_config::{AgentConfig, Settings};
use chatflow_core::conversation::{
    CollaborationMode, ConversationContext, ConversationOutcome, InboundMessage, MessageEntry,
    TakeoverLogEntry,
};
use chatflow_llm::ChatBackend;
use chatflow_persistence::PersistenceLayer;
use chatflow_tools::{MessagingGateway, ToolContext, ToolRegistry};

use crate::collaboration::{AiSuggestion, CollaborationController};
use crate::industry::IndustryPromptSelector;
use crate::metrics::{AnalyticsReport, MetricsAggregator, ScoreWeights, TimeRange};
use crate::orchestrator::{Orchestrator, TurnOutcome};
use crate::EngineError;

/// Collaboration status for the read API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationStatus {
    pub is_human_takeover: bool,
    pub collaboration_mode: CollaborationMode,
    pub escalation_level: u32,
    pub last_ai_suggestion: Option<AiSuggestion>,
    pub ai_suggestions_count: u32,
    pub history: Vec<TakeoverLogEntry>,
}

/// The conversation engine
pub struct Engine {
    backend: Arc<dyn ChatBackend>,
    persistence: PersistenceLayer,
    gateway: Arc<dyn MessagingGateway>,
    orchestrator: Orchestrator,
    aggregator: MetricsAggregator,
    default_agent: AgentConfig,
    agent_configs: DashMap<String, AgentConfig>,
    max_suggestions: usize,
    /// Per-conversation serialization; turns and transitions for one id
    /// never interleave
    locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
    /// Most recent suggestion batch per conversation (ephemeral)
    last_suggestions: DashMap<Uuid, Vec<AiSuggestion>>,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        persistence: PersistenceLayer,
        gateway: Arc<dyn MessagingGateway>,
        settings: Settings,
    ) -> Self {
        Self::with_registry(
            backend,
            persistence,
            gateway,
            settings,
            ToolRegistry::with_default_tools(),
        )
    }

    pub fn with_registry(
        backend: Arc<dyn ChatBackend>,
        persistence: PersistenceLayer,
        gateway: Arc<dyn MessagingGateway>,
        settings: Settings,
        registry: ToolRegistry,
    ) -> Self {
        let selector = Arc::new(IndustryPromptSelector::new(settings.engine.max_prompt_chars));
        let orchestrator = Orchestrator::new(
            backend.clone(),
            Arc::new(registry),
            selector,
            settings.engine.clone(),
        );
        let aggregator = MetricsAggregator::new(
            persistence.takeovers.clone(),
            persistence.conversations.clone(),
            ScoreWeights {
                efficiency: settings.engine.score_weight_efficiency,
                resolution: settings.engine.score_weight_resolution,
                escalation: settings.engine.score_weight_escalation,
            },
        );

        Self {
            backend,
            persistence,
            gateway,
            orchestrator,
            aggregator,
            default_agent: settings.agent,
            agent_configs: DashMap::new(),
            max_suggestions: settings.engine.max_suggestions,
            locks: DashMap::new(),
            last_suggestions: DashMap::new(),
        }
    }

    /// Stores, for seeding media assets and inspecting state
    pub fn persistence(&self) -> &PersistenceLayer {
        &self.persistence
    }

    /// Install a tenant-specific agent configuration
    pub fn set_agent_config(&self, tenant_id: impl Into<String>, config: AgentConfig) {
        self.agent_configs.insert(tenant_id.into(), config);
    }

    fn agent_config(&self, tenant_id: &str) -> AgentConfig {
        self.agent_configs
            .get(tenant_id)
            .map(|c| c.clone())
            .unwrap_or_else(|| self.default_agent.clone())
    }

    fn controller_for(&self, agent: &AgentConfig) -> CollaborationController {
        CollaborationController::new(
            self.persistence.takeovers.clone(),
            agent.repeat_takeover_policy,
            self.max_suggestions,
        )
    }

    fn conversation_lock(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn load(&self, id: Uuid) -> Result<ConversationContext, EngineError> {
        self.persistence
            .conversations
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("conversation {id}")))
    }

    /// Run one customer turn
    ///
    /// Rejected outright while a human has control: no model call, no send.
    /// The conversation snapshot is persisted only when the turn succeeds,
    /// so a failed turn is resumable.
    pub async fn handle_inbound(
        &self,
        inbound: InboundMessage,
    ) -> Result<TurnOutcome, EngineError> {
        let lock = self.conversation_lock(inbound.conversation_id);
        let _guard = lock.lock().await;

        let conversation = match self.persistence.conversations.get(inbound.conversation_id).await? {
            Some(existing) => existing,
            None => ConversationContext::new(
                inbound.conversation_id,
                inbound.tenant_id.clone(),
                inbound.customer_phone.clone(),
            ),
        };

        if !conversation.ai_may_respond() {
            tracing::warn!(
                conversation = %inbound.conversation_id,
                "inbound message while human has control; AI reply suppressed"
            );
            return Err(EngineError::HumanControl);
        }

        let agent = self.agent_config(&inbound.tenant_id);
        let shared = Arc::new(Mutex::new(conversation));
        let ctx = ToolContext::new(
            inbound.tenant_id.clone(),
            shared.clone(),
            self.persistence.leads.clone(),
            self.persistence.records.clone(),
            self.persistence.follow_ups.clone(),
            self.persistence.media.clone(),
            self.gateway.clone(),
        );

        let outcome = self.orchestrator.run_turn(&agent, &inbound, &ctx).await;

        if outcome.success {
            let snapshot = shared.lock().clone();
            self.persistence.conversations.upsert(snapshot).await?;
        }

        Ok(outcome)
    }

    /// Record a human reply sent through the agent console
    ///
    /// Keeps the durable log complete while a takeover is active.
    pub async fn record_human_reply(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<(), EngineError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let mut conversation = self.load(conversation_id).await?;
        conversation.push(MessageEntry::human_agent(content));
        self.persistence.conversations.upsert(conversation).await?;
        Ok(())
    }

    pub async fn request_takeover(
        &self,
        conversation_id: Uuid,
        reason: &str,
        requested_by: &str,
    ) -> Result<(), EngineError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let mut conversation = self.load(conversation_id).await?;
        let controller = self.controller_for(&self.agent_config(&conversation.tenant_id));
        controller
            .request_takeover(&mut conversation, reason, requested_by)
            .await?;
        self.persistence.conversations.upsert(conversation).await?;
        Ok(())
    }

    pub async fn start_takeover(
        &self,
        conversation_id: Uuid,
        reason: &str,
        actor: &str,
    ) -> Result<(), EngineError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let mut conversation = self.load(conversation_id).await?;
        let controller = self.controller_for(&self.agent_config(&conversation.tenant_id));
        controller
            .start_takeover(&mut conversation, reason, actor)
            .await?;
        self.persistence.conversations.upsert(conversation).await?;
        Ok(())
    }

    pub async fn end_takeover(
        &self,
        conversation_id: Uuid,
        return_to: CollaborationMode,
        actor: &str,
    ) -> Result<(), EngineError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let mut conversation = self.load(conversation_id).await?;
        let controller = self.controller_for(&self.agent_config(&conversation.tenant_id));
        controller
            .end_takeover(&mut conversation, return_to, actor)
            .await?;
        self.persistence.conversations.upsert(conversation).await?;
        Ok(())
    }

    /// Draft reply candidates for the human agent in control
    pub async fn ai_suggestions(
        &self,
        conversation_id: Uuid,
        current_message: &str,
    ) -> Result<Vec<AiSuggestion>, EngineError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let mut conversation = self.load(conversation_id).await?;
        let agent = self.agent_config(&conversation.tenant_id);
        let controller = self.controller_for(&agent);
        let suggestions = controller
            .generate_ai_suggestion(
                self.backend.as_ref(),
                &agent,
                &mut conversation,
                current_message,
            )
            .await?;
        self.persistence.conversations.upsert(conversation).await?;
        self.last_suggestions
            .insert(conversation_id, suggestions.clone());
        Ok(suggestions)
    }

    /// Collaboration status plus the ordered takeover history
    pub async fn collaboration_status(
        &self,
        conversation_id: Uuid,
    ) -> Result<CollaborationStatus, EngineError> {
        let conversation = self.load(conversation_id).await?;
        let history = self
            .persistence
            .takeovers
            .list_for_conversation(conversation_id)
            .await?;

        let last_ai_suggestion = self
            .last_suggestions
            .get(&conversation_id)
            .and_then(|batch| batch.first().cloned());

        Ok(CollaborationStatus {
            is_human_takeover: conversation.human_takeover,
            collaboration_mode: conversation.collaboration_mode,
            escalation_level: conversation.escalation_level,
            last_ai_suggestion,
            ai_suggestions_count: conversation.metadata.ai_suggestions_count,
            history,
        })
    }

    /// Mark how a conversation ended; feeds resolution metrics
    pub async fn set_outcome(
        &self,
        conversation_id: Uuid,
        outcome: ConversationOutcome,
    ) -> Result<(), EngineError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let mut conversation = self.load(conversation_id).await?;
        conversation.outcome = outcome;
        conversation.updated_at = chrono::Utc::now();
        self.persistence.conversations.upsert(conversation).await?;
        Ok(())
    }

    pub async fn analytics(&self, range: TimeRange) -> Result<AnalyticsReport, EngineError> {
        self.aggregator.report(range).await
    }
}
