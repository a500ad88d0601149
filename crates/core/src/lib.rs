//! Core types for the chatflow conversation engine
//!
//! This crate provides the foundational types used across all other crates:
//! - Conversation context, message log and collaboration state
//! - CRM entities (leads, business records, follow-up tasks)
//! - Takeover audit log entries
//! - LLM request/response wire types

pub mod conversation;
pub mod lead;
pub mod llm_types;

pub use conversation::{
    CollaborationMode, ConversationContext, ConversationMetadata, ConversationOutcome,
    InboundMessage, MessageEntry, MessageRole, TakeoverEventType, TakeoverLogEntry, ToolMeta,
};
pub use lead::{
    BusinessRecord, BusinessRecordType, CustomerLead, FollowUpPriority, FollowUpStatus,
    FollowUpTask,
};
pub use llm_types::{
    ChatMessage, ChatResponse, Role, StopReason, TokenUsage, ToolCallRequest, ToolDefinition,
};
