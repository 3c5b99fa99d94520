//! Supervisor-driven multi-agent loop

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use orchestrator_core::errors::CrewError;
use orchestrator_providers::LLMBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::supervisor::Supervisor;
use crate::types::{AgentResult, QAPair, SupervisorState};
use crate::worker::Worker;

/// Output returned when a run hits the supervisor iteration cap
pub const MAX_ITERATIONS_OUTPUT: &str = "stopped: max iterations";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiAgentConfig {
    /// Supervisor decisions allowed per run
    pub max_iterations: usize,
}

impl Default for MultiAgentConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

impl MultiAgentConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiAgentOutput {
    /// Final answer
    pub output: String,

    /// Every worker invocation, in order
    pub results: Vec<AgentResult>,

    /// One pair per result, plus `task -> output` when the supervisor finished
    pub qa_pairs: Vec<QAPair>,

    /// Supervisor decisions made
    pub iterations: usize,

    /// False when the iteration cap ended the run
    pub finished: bool,
}

pub struct MultiAgentExecutor {
    supervisor: Supervisor,
    workers: HashMap<String, Worker>,
    config: MultiAgentConfig,
}

impl MultiAgentExecutor {
    /// Pair a supervisor with the workers that can actually run.
    ///
    /// The supervisor's roster and `workers` are independent: a name the
    /// supervisor advertises without a matching worker is recorded as a
    /// failed result when routed to.
    pub fn new(supervisor: Supervisor, workers: Vec<Worker>) -> Self {
        let workers = workers
            .into_iter()
            .map(|w| (w.name().to_string(), w))
            .collect();
        Self {
            supervisor,
            workers,
            config: MultiAgentConfig::default(),
        }
    }

    /// Supervisor whose roster is exactly `workers`
    pub fn from_workers(backend: Arc<dyn LLMBackend>, workers: Vec<Worker>) -> Self {
        let roster = workers.iter().map(|w| w.config.clone()).collect();
        Self::new(Supervisor::new(backend, roster), workers)
    }

    pub fn with_config(mut self, config: MultiAgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Route the task between workers until the supervisor finishes or the
    /// iteration cap is hit
    #[instrument(skip(self, task, plan), fields(workers = self.workers.len()))]
    pub async fn run(&self, task: &str, plan: Option<&str>) -> Result<MultiAgentOutput, CrewError> {
        let mut state = SupervisorState::new(task);
        state.plan = plan.map(str::to_string);

        while state.iteration < self.config.max_iterations {
            state.iteration += 1;
            let decision = self.supervisor.decide(&state).await?;

            if decision.is_finish() {
                let output = if decision.instruction.trim().is_empty() {
                    last_successful_output(&state.results)
                } else {
                    decision.instruction
                };
                info!(iterations = state.iteration, "Multi-agent run finished");
                let answer = QAPair {
                    question: state.task.clone(),
                    answer: output.clone(),
                    agent: None,
                    success: Some(true),
                };
                let mut finished = build_output(output, state, true);
                finished.qa_pairs.push(answer);
                return Ok(finished);
            }

            let result = self.dispatch(&decision.next, &decision.instruction).await;
            state.results.push(result);
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "Multi-agent run hit the iteration cap"
        );
        Ok(build_output(MAX_ITERATIONS_OUTPUT.to_string(), state, false))
    }

    async fn dispatch(&self, name: &str, instruction: &str) -> AgentResult {
        let Some(worker) = self.workers.get(name) else {
            warn!(worker = %name, "Supervisor routed to an unknown worker");
            return AgentResult::failed(name, instruction, format!("unknown worker: {}", name));
        };

        info!(worker = %name, "Dispatching to worker");
        let started = Instant::now();
        let outcome = worker.executor().invoke(instruction).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(run) => AgentResult {
                agent_name: name.to_string(),
                input: instruction.to_string(),
                output: run.output,
                steps: run.steps,
                duration_ms,
                success: run.stopped.is_none(),
                error: run.stopped,
            },
            Err(e) => {
                warn!(worker = %name, error = %e, "Worker failed");
                AgentResult {
                    duration_ms,
                    ..AgentResult::failed(name, instruction, e.to_string())
                }
            }
        }
    }
}

fn last_successful_output(results: &[AgentResult]) -> String {
    results
        .iter()
        .rev()
        .find(|r| r.success)
        .map(|r| r.output.clone())
        .unwrap_or_default()
}

fn build_output(output: String, state: SupervisorState, finished: bool) -> MultiAgentOutput {
    MultiAgentOutput {
        output,
        qa_pairs: state.results.iter().map(QAPair::from).collect(),
        results: state.results,
        iterations: state.iteration,
        finished,
    }
}
