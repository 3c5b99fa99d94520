//! ReAct strategy: text-prompted Thought / Action / Observation loop
//!
//! The model is told about the tools in plain text and answers in a fixed
//! format. Parsing is tolerant and never fails:
//!
//! 1. `Final Answer:` always wins, even if an `Action:` block is present.
//! 2. `Action:` + `Action Input:` becomes one action. The input is read as
//!    JSON, then as `key: value` lines, then as `{"input": <raw text>}`.
//! 3. Anything else is taken as the final answer verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use orchestrator_core::{
    errors::AgentError, to_llm_messages, AgentAction, AgentDecision, AgentFinish, AgentStep,
    LLMMessage, Message,
};
use orchestrator_providers::{CompletionOptions, LLMBackend};
use orchestrator_tools::ToolRegistry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::strategy::{buffered_plan, streamed_plan, AgentStrategy, PlanStream};

const REACT_TEMPLATE: &str = r#"Answer the following questions as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action, as a JSON object
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!"#;

/// Configuration for [`ReActAgent`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReActConfig {
    /// Placed before the fixed template in the system message
    pub system_prompt: Option<String>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,
}

impl ReActConfig {
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

pub struct ReActAgent {
    backend: Arc<dyn LLMBackend>,
    registry: Arc<ToolRegistry>,
    config: ReActConfig,
}

impl ReActAgent {
    pub fn new(backend: Arc<dyn LLMBackend>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            backend,
            registry,
            config: ReActConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReActConfig) -> Self {
        self.config = config;
        self
    }

    /// Optional prefix plus the template with tools filled in
    pub fn system_prompt(&self) -> String {
        let body = REACT_TEMPLATE
            .replace("{tools}", &self.registry.to_prompt_descriptions())
            .replace("{tool_names}", &self.registry.names().join(", "));

        match &self.config.system_prompt {
            Some(prefix) => format!("{}\n\n{}", prefix, body),
            None => body,
        }
    }

    pub fn build_messages(&self, messages: &[Message], steps: &[AgentStep]) -> Vec<LLMMessage> {
        let mut request = vec![LLMMessage::system(self.system_prompt())];
        let mut history = to_llm_messages(messages);

        let scratchpad = format!("{}Thought:", render_scratchpad(steps));
        match history
            .iter_mut()
            .rev()
            .find(|m| m.role == orchestrator_core::MessageRole::User)
        {
            Some(last_human) => {
                last_human.content = format!("{}\n\n{}", last_human.content, scratchpad);
            }
            None => history.push(LLMMessage::user(scratchpad)),
        }

        request.extend(history);
        request
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            tools: Vec::new(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

/// Prior steps as Thought / Action / Action Input / Observation text
pub fn render_scratchpad(steps: &[AgentStep]) -> String {
    let mut pad = String::new();
    for step in steps {
        let log = step.action.log.trim();
        if log.is_empty() {
            pad.push_str(&format!(
                "Action: {}\nAction Input: {}\n",
                step.action.tool_name, step.action.tool_input
            ));
        } else {
            pad.push_str(log);
            pad.push('\n');
        }
        pad.push_str(&format!("Observation: {}\n", step.observation));
    }
    pad
}

static FINAL_ANSWER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)Final Answer\s*:\s*(.*)").ok());
static ACTION: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"Action\s*:\s*([^\r\n]*)").ok());
static ACTION_INPUT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)Action\s*Input\s*:\s*(.*)").ok());

fn capture(pattern: &Lazy<Option<Regex>>, text: &str, group: usize) -> Option<String> {
    let re = pattern.as_ref()?;
    re.captures(text)
        .and_then(|c| c.get(group))
        .map(|m| m.as_str().to_string())
}

/// Parse free-form model output into a decision
pub fn parse_react_output(text: &str) -> AgentDecision {
    if let Some(answer) = capture(&FINAL_ANSWER, text, 1) {
        return AgentDecision::Finish(AgentFinish::new(answer.trim()).with_log(text));
    }

    let tool = capture(&ACTION, text, 1);
    let raw_input = capture(&ACTION_INPUT, text, 1);

    if let (Some(tool), Some(raw_input)) = (tool, raw_input) {
        let tool = tool.trim().trim_matches(|c: char| c == '`' || c == '"' || c == '\'');
        if !tool.is_empty() {
            // Models sometimes hallucinate the observation themselves
            let raw_input = match raw_input.find("\nObservation") {
                Some(end) => &raw_input[..end],
                None => raw_input.as_str(),
            };
            let action = AgentAction::new(tool, parse_action_input(raw_input)).with_log(text.trim());
            return AgentDecision::from_actions(vec![action], text.trim());
        }
    }

    AgentDecision::finish(text.trim())
}

/// JSON object, else `key: value` lines, else `{"input": raw}`
pub fn parse_action_input(raw: &str) -> Value {
    let cleaned = strip_code_fence(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return match value {
            Value::Object(_) => value,
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other);
                Value::Object(map)
            }
        };
    }

    let lines: Vec<&str> = cleaned.lines().filter(|l| !l.trim().is_empty()).collect();
    let pairs: Vec<(&str, &str)> = lines.iter().filter_map(|l| l.split_once(':')).collect();
    if !lines.is_empty() && pairs.len() == lines.len() {
        let mut map = Map::new();
        for (key, value) in pairs {
            let key = key.trim().trim_matches('"');
            if key.is_empty() || key.contains(' ') {
                debug!(line_key = key, "Not a key: value block");
                return single_input(cleaned);
            }
            map.insert(key.to_string(), Value::String(value.trim().to_string()));
        }
        return Value::Object(map);
    }

    single_input(cleaned)
}

fn single_input(raw: &str) -> Value {
    let mut map = Map::new();
    map.insert("input".to_string(), Value::String(raw.to_string()));
    Value::Object(map)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.trim_end().trim_end_matches("```").trim()
}

#[async_trait]
impl AgentStrategy for ReActAgent {
    async fn plan(
        &self,
        messages: &[Message],
        steps: &[AgentStep],
    ) -> Result<AgentDecision, AgentError> {
        let request = self.build_messages(messages, steps);
        let output = self.backend.infer(&request, &self.options()).await?;
        let decision = parse_react_output(&output.content);

        debug!(finish = decision.is_finish(), "ReAct output parsed");
        Ok(decision)
    }

    async fn plan_stream(
        &self,
        messages: &[Message],
        steps: &[AgentStep],
    ) -> Result<PlanStream, AgentError> {
        let request = self.build_messages(messages, steps);

        if !self.backend.supports_streaming() {
            let output = self.backend.infer(&request, &self.options()).await?;
            return Ok(buffered_plan(&output.content, parse_react_output(&output.content)));
        }

        let completion = self.backend.infer_stream(&request, &self.options()).await?;
        Ok(streamed_plan(completion, |output| {
            parse_react_output(&output.content)
        }))
    }

    fn name(&self) -> &str {
        "react"
    }
}
