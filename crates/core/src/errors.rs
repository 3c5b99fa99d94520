//! Error types for the orchestration engine

use thiserror::Error;

/// Agent-related errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Strategy error: {0}")]
    StrategyError(String),

    #[error("LLM error: {0}")]
    LLMError(#[from] LLMError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),
}

/// Tool/function execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout: operation took longer than {0}ms")]
    TimeoutMs(u64),
}

/// LLM backend errors
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Streaming is not supported by this backend")]
    StreamingNotSupported,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout: request took longer than {0}ms")]
    Timeout(u64),
}

/// Multi-agent orchestration errors
#[derive(Error, Debug)]
pub enum CrewError {
    #[error("LLM error: {0}")]
    LLMError(#[from] LLMError),
}

/// Memory errors
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
