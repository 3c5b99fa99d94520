//! Core type definitions for the agent decision loop

use serde::{Deserialize, Serialize};

/// One proposed tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Caller-generated ID, unique within a single decision
    pub id: String,

    /// Tool to invoke
    pub tool_name: String,

    /// Tool input
    pub tool_input: serde_json::Value,

    /// Model text that led to this action (may be empty)
    #[serde(default)]
    pub log: String,
}

impl AgentAction {
    pub fn new(tool_name: impl Into<String>, tool_input: serde_json::Value) -> Self {
        Self {
            id: format!("action_{}", uuid::Uuid::new_v4()),
            tool_name: tool_name.into(),
            tool_input,
            log: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    /// Tool name plus key-order independent input, for detecting repeats
    pub fn signature(&self) -> String {
        format!("{}:{}", self.tool_name, canonical_json(&self.tool_input))
    }

    /// Request form of this action
    pub fn to_tool_call(&self) -> crate::message::ToolCall {
        crate::message::ToolCall {
            id: self.id.clone(),
            name: self.tool_name.clone(),
            arguments: self.tool_input.clone(),
        }
    }
}

impl From<crate::message::ToolCall> for AgentAction {
    fn from(call: crate::message::ToolCall) -> Self {
        Self {
            id: call.id,
            tool_name: call.name,
            tool_input: call.arguments,
            log: String::new(),
        }
    }
}

/// The executed result of one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub action: AgentAction,
    pub observation: String,
    #[serde(default = "default_true")]
    pub success: bool,
}

fn default_true() -> bool {
    true
}

impl AgentStep {
    pub fn new(action: AgentAction, observation: impl Into<String>) -> Self {
        Self {
            action,
            observation: observation.into(),
            success: true,
        }
    }

    pub fn failed(action: AgentAction, observation: impl Into<String>) -> Self {
        Self {
            action,
            observation: observation.into(),
            success: false,
        }
    }
}

/// Final output of an agent turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFinish {
    pub output: String,
    #[serde(default)]
    pub log: String,
}

impl AgentFinish {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            log: String::new(),
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }
}

/// Next step chosen by a strategy: continue with actions, or finish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentDecision {
    Actions { actions: Vec<AgentAction> },
    Finish(AgentFinish),
}

impl AgentDecision {
    /// Build a decision from a list of actions; an empty list finishes
    /// with `fallback_output` so the action variant is never empty.
    pub fn from_actions(actions: Vec<AgentAction>, fallback_output: impl Into<String>) -> Self {
        if actions.is_empty() {
            Self::Finish(AgentFinish::new(fallback_output))
        } else {
            Self::Actions { actions }
        }
    }

    pub fn finish(output: impl Into<String>) -> Self {
        Self::Finish(AgentFinish::new(output))
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish(_))
    }

    pub fn actions(&self) -> &[AgentAction] {
        match self {
            Self::Actions { actions } => actions,
            Self::Finish(_) => &[],
        }
    }
}

/// Events produced by a streaming agent run, in emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental model output
    Token { content: String },

    /// An action was identified and is about to run
    ToolStart { action: AgentAction },

    /// Result of a confirmation request for a gated action
    HumanConfirm { action: AgentAction, approved: bool },

    /// Observation for an action is known
    ToolEnd {
        action: AgentAction,
        observation: String,
        success: bool,
    },

    /// The run failed unexpectedly; always followed by `Finish`
    Error { message: String },

    /// Terminal event, emitted exactly once
    Finish {
        output: String,
        steps: Vec<AgentStep>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stopped: Option<String>,
    },
}

impl AgentEvent {
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}

/// Serialize JSON with object keys sorted at every level
pub fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let fields: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(k.clone()),
                        canonical_json(v)
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
