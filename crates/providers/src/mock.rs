//! Scripted completion service for tests
//!
//! ```rust,ignore
//! use orchestrator_providers::{MockBackend, MockResponse};
//!
//! // First call asks for a search, the second answers
//! let backend = MockBackend::new()
//!     .with_response(MockResponse::tool_call("search", json!({"query": "test"})))
//!     .with_response(MockResponse::text("Hello, world!"));
//! ```

use async_trait::async_trait;
use orchestrator_core::{errors::LLMError, LLMMessage, ToolCall};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::{CompletionOptions, InferenceOutput, LLMBackend, StreamEvent, StreamResponse};

/// One scripted completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockResponse {
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Delay before answering
    pub latency_ms: u64,

    /// Fail with `LLMError::ApiError(failure)` instead of answering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::tool_calls(vec![(name, arguments)])
    }

    pub fn tool_calls(calls: Vec<(impl Into<String>, serde_json::Value)>) -> Self {
        Self {
            tool_calls: calls
                .into_iter()
                .map(|(name, arguments)| ToolCall::new(name, arguments))
                .collect(),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    /// Text that accompanies the tool calls
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    fn into_output(self) -> InferenceOutput {
        InferenceOutput {
            content: self.content,
            tool_calls: (!self.tool_calls.is_empty()).then_some(self.tool_calls),
        }
    }
}

/// Predicate over the request messages
pub type MessageMatcher = Arc<dyn Fn(&[LLMMessage]) -> bool + Send + Sync>;

struct ConditionalResponse {
    matcher: MessageMatcher,
    response: MockResponse,
}

/// A recorded call for inspection
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<LLMMessage>,
    pub options: CompletionOptions,
    pub streamed: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Mock LLM backend for testing
///
/// Conditional responses are checked first, in registration order; otherwise
/// the sequential responses are returned in order, cycling when exhausted.
///
/// Streaming is off by default, so callers exercise their non-streaming
/// fallback; `with_streaming` makes `infer_stream` split content into
/// word-sized deltas.
pub struct MockBackend {
    /// Sequential responses (returned in order)
    responses: Mutex<Vec<MockResponse>>,

    /// Current response index
    response_index: AtomicUsize,

    /// Pattern-based responses
    conditional_responses: Mutex<Vec<ConditionalResponse>>,

    /// Recorded calls
    recorded_calls: Mutex<Vec<RecordedCall>>,

    /// Whether `infer_stream` is available
    streaming: bool,
}

impl MockBackend {
    /// Create a new MockBackend with default configuration
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            response_index: AtomicUsize::new(0),
            conditional_responses: Mutex::new(Vec::new()),
            recorded_calls: Mutex::new(Vec::new()),
            streaming: false,
        }
    }

    /// Enable simulated streaming
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Add a sequential response
    pub fn with_response(self, response: MockResponse) -> Self {
        self.responses.lock().push(response);
        self
    }

    /// Add multiple sequential responses
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        self.responses.lock().extend(responses);
        self
    }

    /// Answer with `response` whenever `matcher` accepts the request
    pub fn when<F>(self, matcher: F, response: MockResponse) -> Self
    where
        F: Fn(&[LLMMessage]) -> bool + Send + Sync + 'static,
    {
        self.conditional_responses.lock().push(ConditionalResponse {
            matcher: Arc::new(matcher),
            response,
        });
        self
    }

    /// Get all recorded calls
    pub fn get_recorded_calls(&self) -> Vec<RecordedCall> {
        self.recorded_calls.lock().clone()
    }

    /// Get the number of calls made
    pub fn call_count(&self) -> usize {
        self.recorded_calls.lock().len()
    }

    /// Get the last call made
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.recorded_calls.lock().last().cloned()
    }

    fn record(&self, messages: &[LLMMessage], options: &CompletionOptions, streamed: bool) {
        self.recorded_calls.lock().push(RecordedCall {
            messages: messages.to_vec(),
            options: options.clone(),
            streamed,
            timestamp: chrono::Utc::now(),
        });
    }

    fn get_next_response(&self, messages: &[LLMMessage]) -> MockResponse {
        let matched = self
            .conditional_responses
            .lock()
            .iter()
            .find(|c| (c.matcher)(messages))
            .map(|c| c.response.clone());
        if let Some(response) = matched {
            return response;
        }

        let responses = self.responses.lock();
        if responses.is_empty() {
            return MockResponse::text("Mock response");
        }

        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses[index % responses.len()].clone()
    }

    async fn respond(&self, messages: &[LLMMessage]) -> Result<MockResponse, LLMError> {
        let response = self.get_next_response(messages);

        if response.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(response.latency_ms)).await;
        }

        if let Some(message) = &response.failure {
            return Err(LLMError::ApiError(message.clone()));
        }

        Ok(response)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMBackend for MockBackend {
    async fn infer(
        &self,
        messages: &[LLMMessage],
        options: &CompletionOptions,
    ) -> Result<InferenceOutput, LLMError> {
        tracing::debug!(messages = messages.len(), tools = options.tools.len(), "mock inference");
        self.record(messages, options, false);
        Ok(self.respond(messages).await?.into_output())
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn infer_stream(
        &self,
        messages: &[LLMMessage],
        options: &CompletionOptions,
    ) -> Result<StreamResponse, LLMError> {
        if !self.streaming {
            return Err(LLMError::StreamingNotSupported);
        }

        self.record(messages, options, true);
        let response = self.respond(messages).await?;

        let stream = async_stream::stream! {
            for delta in response.content.split_inclusive(' ') {
                yield Ok(StreamEvent::TextDelta(delta.to_string()));
            }
            for call in response.tool_calls {
                yield Ok(StreamEvent::ToolCall(call));
            }
            yield Ok(StreamEvent::Done);
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
