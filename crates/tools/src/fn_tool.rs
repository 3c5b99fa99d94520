//! Closure-backed tools
//!
//! ```rust,ignore
//! let add = tool_fn(
//!     ToolSchema::new("add", "Add two numbers").with_parameters(json!({
//!         "type": "object",
//!         "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
//!         "required": ["a", "b"]
//!     })),
//!     |input| async move {
//!         let a = input["a"].as_f64().unwrap_or_default();
//!         let b = input["b"].as_f64().unwrap_or_default();
//!         Ok((a + b).to_string())
//!     },
//! );
//! registry.register(Arc::new(add));
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use orchestrator_core::{
    errors::ToolError,
    tool::{ExecutionContext, Tool, ToolSchema},
};

type ToolHandler =
    Arc<dyn Fn(ExecutionContext, serde_json::Value) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync>;

/// A tool whose body is an async closure
#[derive(Clone)]
pub struct FnTool {
    schema: ToolSchema,
    handler: ToolHandler,
}

impl FnTool {
    /// Build a tool from a closure that only needs the validated input
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |_context, input| Box::pin(handler(input))),
        }
    }

    /// Build a tool from a closure that also receives the execution context
    pub fn with_context<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(ExecutionContext, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |context, input| Box::pin(handler(context, input))),
        }
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.schema.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(
        &self,
        context: &ExecutionContext,
        input: serde_json::Value,
    ) -> Result<String, ToolError> {
        (self.handler)(context.clone(), input).await
    }
}

/// Shorthand for [`FnTool::new`]
pub fn tool_fn<F, Fut>(schema: ToolSchema, handler: F) -> FnTool
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
{
    FnTool::new(schema, handler)
}
