//! Supervisor: picks the next worker (or finishes) from the run so far
//!
//! The model is asked for a strict JSON decision, but routing never fails on
//! malformed output. [`parse_supervisor_output`] walks a fixed fallback chain
//! and always produces a decision.

use std::sync::Arc;

use once_cell::sync::Lazy;
use orchestrator_core::LLMMessage;
use orchestrator_providers::{CompletionOptions, LLMBackend};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use orchestrator_core::errors::CrewError;

use crate::types::{SupervisorDecision, SupervisorState, WorkerConfig, FINISH};

const SUPERVISOR_PROMPT: &str = r#"You are a supervisor coordinating a team of workers:

{workers}

Given the task and the results so far, choose the worker that should act next and tell it exactly what to do. When the task is complete, choose FINISH and put the final answer in "instruction".

Respond with a single JSON object and nothing else:
{"next": "<worker name or FINISH>", "instruction": "<sub-task or final answer>", "reasoning": "<short justification>"}"#;

/// Keyword table for routing free text that names no worker
const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    ("math", &["math", "calculat", "compute", "arithmetic", "equation", "sum"]),
    ("time", &["time", "date", "clock", "today", "schedule"]),
    ("search", &["search", "look up", "lookup", "find", "research", "web"]),
    ("code", &["code", "program", "script", "debug", "function", "compile"]),
    ("file", &["file", "directory", "folder", "read", "write", "document"]),
];

const COMPLETION_MARKERS: &[&str] = &["finish", "完成", "最终答案"];

static FENCED_JSON: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok());
static NEXT_FIELD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""?next"?\s*[:=]\s*"([^"]+)""#).ok());
static INSTRUCTION_FIELD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""?instruction"?\s*[:=]\s*"((?:[^"\\]|\\.)*)""#).ok());

/// Configuration for [`Supervisor`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Placed before the built-in routing instructions
    pub system_prompt: Option<String>,

    pub temperature: f32,

    pub max_tokens: Option<u32>,
}

impl SupervisorConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

pub struct Supervisor {
    backend: Arc<dyn LLMBackend>,
    workers: Vec<WorkerConfig>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(backend: Arc<dyn LLMBackend>, workers: Vec<WorkerConfig>) -> Self {
        Self {
            backend,
            workers,
            config: SupervisorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn workers(&self) -> &[WorkerConfig] {
        &self.workers
    }

    pub fn system_prompt(&self) -> String {
        let roster: Vec<String> = self
            .workers
            .iter()
            .map(|w| format!("- {}: {}", w.name, w.description))
            .collect();
        let body = SUPERVISOR_PROMPT.replace("{workers}", &roster.join("\n"));

        match &self.config.system_prompt {
            Some(prefix) => format!("{}\n\n{}", prefix, body),
            None => body,
        }
    }

    pub fn build_messages(&self, state: &SupervisorState) -> Vec<LLMMessage> {
        let mut messages = vec![
            LLMMessage::system(self.system_prompt()),
            LLMMessage::user(format!("Task: {}", state.task)),
        ];

        if let Some(plan) = &state.plan {
            messages.push(LLMMessage::user(format!("Plan:\n{}", plan)));
        }

        if !state.results.is_empty() {
            let transcript: Vec<String> = state
                .results
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let outcome = if r.success {
                        r.output.clone()
                    } else {
                        format!("FAILED: {}", r.error.as_deref().unwrap_or("unknown error"))
                    };
                    format!("[{}] {} was asked: {}\nResult: {}", i + 1, r.agent_name, r.input, outcome)
                })
                .collect();
            messages.push(LLMMessage::user(format!(
                "Results so far:\n{}",
                transcript.join("\n\n")
            )));
        }

        messages
    }

    /// Ask the model for the next routing decision
    #[instrument(skip(self, state), fields(iteration = state.iteration, results = state.results.len()))]
    pub async fn decide(&self, state: &SupervisorState) -> Result<SupervisorDecision, CrewError> {
        let options = CompletionOptions {
            tools: Vec::new(),
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
        };

        let output = self
            .backend
            .infer(&self.build_messages(state), &options)
            .await?;

        let decision = parse_supervisor_output(&output.content, &self.workers, &state.task);
        debug!(next = %decision.next, "Supervisor decided");
        Ok(decision)
    }
}

/// Map a routing target to a configured worker name or [`FINISH`]
fn resolve_target(name: &str, workers: &[WorkerConfig]) -> Option<String> {
    let name = name.trim();
    if name.eq_ignore_ascii_case(FINISH) {
        return Some(FINISH.to_string());
    }
    workers
        .iter()
        .find(|w| w.name.eq_ignore_ascii_case(name))
        .map(|w| w.name.clone())
}

fn fenced_json(text: &str) -> Option<String> {
    FENCED_JSON
        .as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First top-level `{ ... }`, ignoring braces inside strings
fn balanced_object(text: &str) -> Option<&str> {
    let mut in_string = false;
    let mut escape = false;
    let mut depth = 0usize;
    let mut start = None;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| &text[s..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

fn from_json(text: &str, workers: &[WorkerConfig]) -> Option<SupervisorDecision> {
    let candidate = fenced_json(text).or_else(|| balanced_object(text).map(str::to_string))?;
    let value: serde_json::Value = serde_json::from_str(&candidate).ok()?;

    let next = resolve_target(value.get("next")?.as_str()?, workers)?;
    let instruction = value
        .get("instruction")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let mut decision = SupervisorDecision::route(next, instruction.trim());
    if let Some(reasoning) = value.get("reasoning").and_then(|v| v.as_str()) {
        decision = decision.with_reasoning(reasoning);
    }
    Some(decision)
}

fn from_fields(text: &str, workers: &[WorkerConfig], task: &str) -> Option<SupervisorDecision> {
    let next = NEXT_FIELD.as_ref()?.captures(text)?.get(1)?.as_str();
    let next = resolve_target(next, workers)?;

    let instruction = INSTRUCTION_FIELD
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("\\\"", "\"").replace("\\n", "\n"));

    let instruction = match instruction {
        Some(instruction) => instruction,
        None if next == FINISH => String::new(),
        None => task.to_string(),
    };
    Some(SupervisorDecision::route(next, instruction))
}

fn from_worker_mention(text: &str, workers: &[WorkerConfig], task: &str) -> Option<SupervisorDecision> {
    let (worker, end) = workers
        .iter()
        .filter_map(|w| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&w.name))).ok()?;
            re.find(text).map(|m| (w, m.start(), m.end()))
        })
        .min_by_key(|(_, start, _)| *start)
        .map(|(w, _, end)| (w, end))?;

    let rest = text[end..]
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | ',' | '"' | '\'' | '*'))
        .trim();
    let instruction = if rest.is_empty() { task } else { rest };
    Some(SupervisorDecision::route(worker.name.clone(), instruction))
}

fn from_keywords(text: &str, workers: &[WorkerConfig], task: &str) -> Option<SupervisorDecision> {
    let lower = text.to_lowercase();

    for (kind, keywords) in KEYWORD_TABLE {
        if !keywords.iter().any(|k| lower.contains(k)) {
            continue;
        }
        let matched = workers.iter().find(|w| {
            let profile = format!("{} {}", w.name, w.description).to_lowercase();
            profile.contains(kind) || keywords.iter().any(|k| profile.contains(k))
        });
        if let Some(worker) = matched {
            return Some(SupervisorDecision::route(worker.name.clone(), task));
        }
    }

    None
}

fn says_finished(text: &str) -> bool {
    let lower = text.to_lowercase();
    COMPLETION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Turn supervisor text into a decision, degrading through:
///
/// 1. JSON object (fenced block first, else first balanced `{...}`)
/// 2. `"next"` / `"instruction"` fields pulled out by regex
/// 3. earliest mention of a worker name; the text after it is the instruction
/// 4. task-type keywords matched against worker names and descriptions
/// 5. completion language ends the run
/// 6. first worker gets the whole task (or FINISH when there are no workers)
pub fn parse_supervisor_output(
    text: &str,
    workers: &[WorkerConfig],
    task: &str,
) -> SupervisorDecision {
    if let Some(decision) = from_json(text, workers) {
        return decision;
    }

    if let Some(decision) = from_fields(text, workers, task) {
        warn!(next = %decision.next, "Supervisor output was not valid JSON, used field extraction");
        return decision;
    }

    if let Some(decision) = from_worker_mention(text, workers, task) {
        warn!(next = %decision.next, "Supervisor output routed by worker mention");
        return decision;
    }

    if let Some(decision) = from_keywords(text, workers, task) {
        warn!(next = %decision.next, "Supervisor output routed by keyword");
        return decision;
    }

    if says_finished(text) {
        warn!("Supervisor output read as completion");
        return SupervisorDecision::finish("");
    }

    match workers.first() {
        Some(worker) => {
            warn!(next = %worker.name, "Supervisor output unusable, defaulting to first worker");
            SupervisorDecision::route(worker.name.clone(), task)
        }
        None => {
            warn!("Supervisor output unusable and no workers configured, finishing");
            SupervisorDecision::finish("")
        }
    }
}
