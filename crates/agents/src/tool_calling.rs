//! Native function-calling strategy

use std::sync::Arc;

use async_trait::async_trait;
use orchestrator_core::{
    errors::AgentError, to_llm_messages, AgentAction, AgentDecision, AgentStep, LLMMessage,
    Message,
};
use orchestrator_providers::{CompletionOptions, InferenceOutput, LLMBackend};
use orchestrator_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::strategy::{buffered_plan, streamed_plan, AgentStrategy, PlanStream};

/// Configuration for [`ToolCallingAgent`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallingConfig {
    /// Prepended as a system message
    pub system_prompt: Option<String>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,
}

impl ToolCallingConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
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

/// Lets the completion service pick tools through its native tool-call API
pub struct ToolCallingAgent {
    backend: Arc<dyn LLMBackend>,
    registry: Arc<ToolRegistry>,
    config: ToolCallingConfig,
}

impl ToolCallingAgent {
    pub fn new(backend: Arc<dyn LLMBackend>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            backend,
            registry,
            config: ToolCallingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ToolCallingConfig) -> Self {
        self.config = config;
        self
    }

    /// System prompt, history, then each step as an assistant tool call
    /// followed by its tool result
    pub fn build_messages(&self, messages: &[Message], steps: &[AgentStep]) -> Vec<LLMMessage> {
        let mut request = Vec::with_capacity(messages.len() + steps.len() * 2 + 1);

        if let Some(prompt) = &self.config.system_prompt {
            request.push(LLMMessage::system(prompt.clone()));
        }
        request.extend(to_llm_messages(messages));

        for step in steps {
            let call = step.action.to_tool_call();
            request.push(LLMMessage::assistant_with_tools("", vec![call.clone()]));
            request.push(LLMMessage::tool(call.id, call.name, step.observation.clone()));
        }

        request
    }

    fn options(&self) -> CompletionOptions {
        let mut options = CompletionOptions::new().with_tools(self.registry.to_definitions());
        options.temperature = self.config.temperature;
        options.max_tokens = self.config.max_tokens;
        options
    }
}

/// Map a completion to a decision: tool calls become actions, otherwise finish
pub fn decide_from_tool_calls(output: InferenceOutput) -> AgentDecision {
    let InferenceOutput {
        content,
        tool_calls,
    } = output;

    let actions: Vec<AgentAction> = tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let call = if call.id.is_empty() {
                call.with_id(format!("call_{}", uuid::Uuid::new_v4()))
            } else {
                call
            };
            AgentAction::from(call).with_log(content.clone())
        })
        .collect();

    AgentDecision::from_actions(actions, content)
}

#[async_trait]
impl AgentStrategy for ToolCallingAgent {
    async fn plan(
        &self,
        messages: &[Message],
        steps: &[AgentStep],
    ) -> Result<AgentDecision, AgentError> {
        let request = self.build_messages(messages, steps);
        let output = self.backend.infer(&request, &self.options()).await?;

        debug!(
            tool_calls = output.calls().len(),
            "Tool-calling completion received"
        );
        Ok(decide_from_tool_calls(output))
    }

    async fn plan_stream(
        &self,
        messages: &[Message],
        steps: &[AgentStep],
    ) -> Result<PlanStream, AgentError> {
        if !self.backend.supports_streaming() {
            let request = self.build_messages(messages, steps);
            let output = self.backend.infer(&request, &self.options()).await?;
            let text = output.content.clone();
            return Ok(buffered_plan(&text, decide_from_tool_calls(output)));
        }

        let request = self.build_messages(messages, steps);
        let completion = self.backend.infer_stream(&request, &self.options()).await?;
        Ok(streamed_plan(completion, decide_from_tool_calls))
    }

    fn name(&self) -> &str {
        "tool_calling"
    }
}
