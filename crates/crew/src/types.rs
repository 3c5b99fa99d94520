//! Shared types for supervisor/worker orchestration

use orchestrator_core::AgentStep;
use serde::{Deserialize, Serialize};

/// Routing target that ends a multi-agent run
pub const FINISH: &str = "FINISH";

/// Static identity of a worker, used for prompting and routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Unique worker name
    pub name: String,

    /// What the worker is good at
    pub description: String,

    /// System prompt for the worker's own strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl WorkerConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Outcome of one worker invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub input: String,
    pub output: String,
    pub steps: Vec<AgentStep>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    /// Failed result that never ran a worker
    pub fn failed(
        agent_name: impl Into<String>,
        input: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            input: input.into(),
            output: String::new(),
            steps: Vec::new(),
            duration_ms: 0,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Supervisor routing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorDecision {
    /// Worker name or [`FINISH`]
    pub next: String,

    /// Sub-task for the worker, or the final answer when finishing
    #[serde(default)]
    pub instruction: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl SupervisorDecision {
    pub fn route(next: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            next: next.into(),
            instruction: instruction.into(),
            reasoning: None,
        }
    }

    pub fn finish(instruction: impl Into<String>) -> Self {
        Self::route(FINISH, instruction)
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn is_finish(&self) -> bool {
        self.next == FINISH
    }
}

/// Question/answer record of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QAPair {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl From<&AgentResult> for QAPair {
    fn from(result: &AgentResult) -> Self {
        Self {
            question: result.input.clone(),
            answer: match &result.error {
                Some(error) if !result.success => format!("Error: {}", error),
                _ => result.output.clone(),
            },
            agent: Some(result.agent_name.clone()),
            success: Some(result.success),
        }
    }
}

/// What the supervisor sees when deciding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorState {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    pub results: Vec<AgentResult>,
    pub iteration: usize,
}

impl SupervisorState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }
}
