//! Chat backend trait and test double

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use chatflow_core::llm_types::{ChatMessage, ChatResponse, ToolDefinition};

use crate::LlmError;

/// A chat-completion backend with native tool calling
///
/// Implementations translate the neutral message/tool types into their
/// provider wire format. One call is one network round trip; retry policy
/// belongs to the caller.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one chat completion, offering `tools` to the model
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError>;

    /// Model identifier for logging
    fn model_name(&self) -> &str;
}

/// A recorded chat call, for test assertions
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// Scripted backend for tests
///
/// Responses are popped in order; once the script is exhausted every call
/// fails with an API error, which makes over-calling loud in tests.
pub struct MockBackend {
    script: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn push_response(&self, response: ChatResponse) {
        self.script.lock().push_back(Ok(response));
    }

    /// Queue a failure
    pub fn push_error(&self, error: LlmError) {
        self.script.lock().push_back(Err(error));
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        self.calls.lock().push(RecordedCall {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });

        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("mock script exhausted".to_string())))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
