//! Tool/function definitions for agent capabilities

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ToolError;

/// Tool/function schema used for prompting, validation and routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (unique registry key)
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input parameters schema (JSON Schema object)
    pub parameters: serde_json::Value,

    /// Whether a human must confirm each call before it runs
    #[serde(default)]
    pub requires_confirmation: bool,

    /// Free-form tags for grouping tools
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            requires_confirmation: false,
            tags: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_confirmation(mut self, requires_confirmation: bool) -> Self {
        self.requires_confirmation = requires_confirmation;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Names listed in the schema's `required` array
    pub fn required_fields(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// Provider-facing function definition
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Function definition sent to a completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Execution context for tool calls
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Agent making the tool call
    pub agent_name: String,

    /// Call ID of the action being executed
    pub call_id: String,

    /// Additional context data
    pub data: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            call_id: String::new(),
            data: HashMap::new(),
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

/// Tool/function trait
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with already validated input
    async fn execute(
        &self,
        context: &ExecutionContext,
        input: serde_json::Value,
    ) -> Result<String, ToolError>;
}

/// Outcome of one tool invocation, discriminated by `success`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call ID this result corresponds to
    pub call_id: String,

    /// Success status
    pub success: bool,

    /// Tool output (empty on failure)
    pub output: String,

    /// Error message if failed
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Text recorded as the step observation
    pub fn observation(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}
