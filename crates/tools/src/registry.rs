//! Tool registry with validation and timed execution

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use orchestrator_core::{
    errors::ToolError,
    tool::{ExecutionContext, Tool, ToolDefinition, ToolResult, ToolSchema},
    ToolCall,
};

use crate::validation::validate_input;

/// Registry of callable tools, keyed by schema name
///
/// Registration goes through `&self`, so a registry can be shared as
/// `Arc<ToolRegistry>` and still grow after it has been handed out.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if self.tools.write().insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Tool already registered, overwriting");
        } else {
            debug!(tool = %name, "Registered tool");
        }
    }

    /// Register several tools at once
    pub fn register_many(&self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Tools carrying `tag`, sorted by name
    pub fn get_by_tag(&self, tag: &str) -> Vec<Arc<dyn Tool>> {
        let mut tagged: Vec<(String, Arc<dyn Tool>)> = self
            .tools
            .read()
            .iter()
            .filter(|(_, tool)| tool.schema().has_tag(tag))
            .map(|(name, tool)| (name.clone(), tool.clone()))
            .collect();
        tagged.sort_by(|a, b| a.0.cmp(&b.0));
        tagged.into_iter().map(|(_, tool)| tool).collect()
    }

    /// Check if tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get tool count
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// All schemas, sorted by name
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.tools.read().values().map(|tool| tool.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Function definitions for native tool calling
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.list_schemas()
            .iter()
            .map(ToolSchema::to_definition)
            .collect()
    }

    /// Human-readable tool list for text-prompted strategies
    pub fn to_prompt_descriptions(&self) -> String {
        let blocks: Vec<String> = self.list_schemas().iter().map(describe_tool).collect();
        blocks.join("\n")
    }

    /// Execute a tool by name with a default context
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        timeout: Duration,
    ) -> ToolResult {
        self.execute_with_context(&ExecutionContext::default(), name, input, timeout)
            .await
    }

    /// Look up, validate and run one tool under a timeout.
    ///
    /// Every failure mode (unknown tool, invalid input, tool error, panic,
    /// timeout) is reported as a failed [`ToolResult`].
    pub async fn execute_with_context(
        &self,
        context: &ExecutionContext,
        name: &str,
        input: serde_json::Value,
        timeout: Duration,
    ) -> ToolResult {
        let call_id = context.call_id.clone();

        let Some(tool) = self.get(name) else {
            error!(tool = %name, "Tool not found");
            return ToolResult::failure(call_id, ToolError::NotFound(name.to_string()).to_string());
        };

        let input = match validate_input(&tool.schema(), input) {
            Ok(input) => input,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool input rejected");
                return ToolResult::failure(call_id, e.to_string());
            }
        };

        debug!(tool = %name, call_id = %call_id, "Executing tool");

        let run = AssertUnwindSafe(tool.execute(context, input)).catch_unwind();
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(Ok(output))) => {
                debug!(tool = %name, "Tool executed successfully");
                ToolResult::success(call_id, output)
            }
            Ok(Ok(Err(e))) => {
                error!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::failure(call_id, e.to_string())
            }
            Ok(Err(_)) => {
                error!(tool = %name, "Tool panicked");
                ToolResult::failure(
                    call_id,
                    ToolError::ExecutionFailed("tool panicked".to_string()).to_string(),
                )
            }
            Err(_) => {
                let ms = timeout.as_millis() as u64;
                error!(tool = %name, timeout_ms = ms, "Tool timed out");
                ToolResult::failure(call_id, ToolError::TimeoutMs(ms).to_string())
            }
        }
    }

    /// Run calls concurrently, each racing its own timeout
    pub async fn execute_parallel(
        &self,
        calls: &[ToolCall],
        timeout: Duration,
    ) -> HashMap<String, ToolResult> {
        self.execute_parallel_with_context(&ExecutionContext::default(), calls, timeout)
            .await
    }

    /// Like [`execute_parallel`](Self::execute_parallel), deriving each
    /// call's context from `base` with the call's id filled in.
    pub async fn execute_parallel_with_context(
        &self,
        base: &ExecutionContext,
        calls: &[ToolCall],
        timeout: Duration,
    ) -> HashMap<String, ToolResult> {
        debug!(count = calls.len(), "Executing tools in parallel");

        let tasks = calls.iter().map(|call| {
            let context = base.clone().with_call_id(call.id.clone());
            async move {
                let result = self
                    .execute_with_context(&context, &call.name, call.arguments.clone(), timeout)
                    .await;
                (call.id.clone(), result)
            }
        });

        join_all(tasks).await.into_iter().collect()
    }
}

fn describe_tool(schema: &ToolSchema) -> String {
    let mut lines = vec![format!("- {}: {}", schema.name, schema.description)];

    let required = schema.required_fields();
    let properties = schema
        .parameters
        .get("properties")
        .and_then(serde_json::Value::as_object);

    if let Some(properties) = properties {
        let mut names: Vec<&String> = properties.keys().collect();
        names.sort();

        for name in names {
            let property = &properties[name.as_str()];
            let mut attributes = vec![property
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("any")
                .to_string()];
            attributes.push(if required.contains(&name.as_str()) {
                "required".to_string()
            } else {
                "optional".to_string()
            });
            if let Some(options) = property.get("enum").and_then(serde_json::Value::as_array) {
                let options: Vec<String> = options
                    .iter()
                    .map(|o| o.as_str().map(str::to_string).unwrap_or_else(|| o.to_string()))
                    .collect();
                attributes.push(format!("one of: {}", options.join(", ")));
            }

            let mut line = format!("    {} ({})", name, attributes.join(", "));
            if let Some(description) = property.get("description").and_then(serde_json::Value::as_str) {
                line.push_str(": ");
                line.push_str(description);
            }
            lines.push(line);
        }
    }

    lines.join("\n")
}
