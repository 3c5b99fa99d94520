//! Backend trait for completion services

use async_trait::async_trait;
use futures::Stream;
use orchestrator_core::{errors::LLMError, LLMMessage, ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Options for one completion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Tool definitions offered for native function calling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// LLM inference output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceOutput {
    /// Generated content
    pub content: String,

    /// Tool calls (if any)
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl InferenceOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Tool calls, treating `None` and an empty list alike
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Streaming chunk from a completion service
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text content delta
    TextDelta(String),

    /// A complete tool call
    ToolCall(ToolCall),

    /// Stream completed
    Done,
}

/// Type alias for streaming response
pub type StreamResponse = Pin<Box<dyn Stream<Item = Result<StreamEvent, LLMError>> + Send>>;

/// Completion service contract
#[async_trait]
pub trait LLMBackend: Send + Sync {
    /// Perform a single completion
    async fn infer(
        &self,
        messages: &[LLMMessage],
        options: &CompletionOptions,
    ) -> Result<InferenceOutput, LLMError>;

    /// Whether `infer_stream` is available. Callers must check this and
    /// fall back to `infer` when it returns false.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Perform a streaming completion
    async fn infer_stream(
        &self,
        _messages: &[LLMMessage],
        _options: &CompletionOptions,
    ) -> Result<StreamResponse, LLMError> {
        Err(LLMError::StreamingNotSupported)
    }

    /// Backend name for logging
    fn name(&self) -> &str {
        "llm"
    }
}
