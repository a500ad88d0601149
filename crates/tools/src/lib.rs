//! Tools for the chatflow engine
//!
//! Declares the `Tool` contract, the tenant-scoped registry and the four
//! side-effecting executors the model may request. Executors never panic past
//! their boundary: every failure becomes a structured `ToolCallResult`.

pub mod gateway;
pub mod registry;
pub mod schema;
pub mod tools;

pub use gateway::{GatewayError, MessagingGateway, SentMessage, StubMessagingGateway};
pub use registry::ToolRegistry;
pub use schema::{
    InputSchema, PropertySchema, SideEffect, Tool, ToolCallResult, ToolContext, ToolError,
    ToolOutput, ToolSchema,
};
pub use tools::{
    AnalyzeCustomerIntentTool, SaveConversationDataTool, ScheduleFollowUpTool, SendMultimediaTool,
};
