//! Agent executor: the bounded plan / act / observe loop
//!
//! Each iteration evaluates stop conditions, asks the strategy for a
//! decision, then runs the chosen tools. Ungated tools run concurrently and
//! are joined before their steps are appended; tools that need confirmation
//! run one at a time after the handler approves them.
//!
//! ```text
//! ┌──────────────┐  stop?  ┌──────────┐ finish ┌──────────────┐
//! │  iteration++ │───no───>│   plan   │───────>│ save memory  │
//! └──────────────┘         └────┬─────┘        └──────────────┘
//!        ^                      │ actions
//!        │               ┌──────▼───────┐
//!        └───────────────│ act/observe  │
//!                        └──────────────┘
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, instrument, warn};

use orchestrator_core::{
    errors::AgentError, AgentAction, AgentDecision, AgentEvent, AgentStep, ExecutionContext,
    Message, ToolCall, ToolResult,
};
use orchestrator_tools::ToolRegistry;

use crate::approvals::{ConfirmationHandler, REJECTED_OBSERVATION};
use crate::memory::Memory;
use crate::stop::{MaxIterations, RepeatedAction, StopCondition, StopContext};
use crate::strategy::{AgentStrategy, PlanEvent};

/// Stream of events from [`AgentExecutor::stream`]
pub type AgentEventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// Configuration for [`AgentExecutor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Name passed to tools in their execution context
    pub agent_name: String,

    /// Planning calls allowed per invocation
    pub max_iterations: usize,

    /// Per-tool timeout
    pub tool_timeout_ms: u64,

    /// Keep going after a tool fails
    pub continue_on_error: bool,

    /// Stop after this many identical consecutive actions (0 or 1 disables)
    pub repeated_action_limit: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            agent_name: "agent".to_string(),
            max_iterations: 10,
            tool_timeout_ms: 30_000,
            continue_on_error: true,
            repeated_action_limit: 3,
        }
    }
}

impl ExecutorConfig {
    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tool_timeout_ms(mut self, ms: u64) -> Self {
        self.tool_timeout_ms = ms;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_repeated_action_limit(mut self, limit: usize) -> Self {
        self.repeated_action_limit = limit;
        self
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOutput {
    /// Final answer, or an explanation of why the run stopped
    pub output: String,

    /// Steps in invocation order
    pub steps: Vec<AgentStep>,

    /// Planning calls made
    pub iterations: usize,

    /// Reason the run was stopped early, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<String>,
}

/// Observation for one action plus the failure that should halt the run
struct ActionOutcome {
    step: AgentStep,
    failure: Option<String>,
}

fn emit(events: Option<&UnboundedSender<AgentEvent>>, event: impl FnOnce() -> AgentEvent) {
    if let Some(tx) = events {
        // Receiver gone means nobody is listening; the run still completes
        let _ = tx.send(event());
    }
}

/// Runs a strategy against a tool registry until it finishes or is stopped
#[derive(Clone)]
pub struct AgentExecutor {
    strategy: Arc<dyn AgentStrategy>,
    registry: Arc<ToolRegistry>,
    memory: Option<Arc<dyn Memory>>,
    confirmation: Option<Arc<dyn ConfirmationHandler>>,
    stop_conditions: Vec<Arc<dyn StopCondition>>,
    config: ExecutorConfig,
}

impl AgentExecutor {
    pub fn new(strategy: Arc<dyn AgentStrategy>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            strategy,
            registry,
            memory: None,
            confirmation: None,
            stop_conditions: Vec::new(),
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_confirmation(mut self, handler: Arc<dyn ConfirmationHandler>) -> Self {
        self.confirmation = Some(handler);
        self
    }

    /// Add a condition checked alongside the built-in ones
    pub fn with_stop_condition(mut self, condition: Arc<dyn StopCondition>) -> Self {
        self.stop_conditions.push(condition);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run to completion
    #[instrument(skip(self, input), fields(agent = %self.config.agent_name, strategy = %self.strategy.name()))]
    pub async fn invoke(&self, input: &str) -> Result<ExecutorOutput, AgentError> {
        self.run(input, None).await
    }

    /// Run in a background task, yielding events as they happen.
    ///
    /// Must be called from within a tokio runtime. The stream always ends
    /// with exactly one [`AgentEvent::Finish`]; a failed run emits
    /// [`AgentEvent::Error`] first.
    pub fn stream(&self, input: impl Into<String>) -> AgentEventStream {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = self.clone();
        let input = input.into();

        tokio::spawn(async move {
            if let Err(e) = executor.run(&input, Some(&tx)).await {
                error!(agent = %executor.config.agent_name, error = %e, "Agent run failed");
                let message = e.to_string();
                let _ = tx.send(AgentEvent::Error {
                    message: message.clone(),
                });
                let _ = tx.send(AgentEvent::Finish {
                    output: format!("execution failed: {}", message),
                    steps: Vec::new(),
                    stopped: Some("error".to_string()),
                });
            }
        });

        Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        })
    }

    fn conditions(&self) -> Vec<Arc<dyn StopCondition>> {
        let mut conditions: Vec<Arc<dyn StopCondition>> = vec![
            Arc::new(MaxIterations(self.config.max_iterations)),
            Arc::new(RepeatedAction(self.config.repeated_action_limit)),
        ];
        conditions.extend(self.stop_conditions.iter().cloned());
        conditions
    }

    async fn run(
        &self,
        input: &str,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<ExecutorOutput, AgentError> {
        let mut messages = match &self.memory {
            Some(memory) => memory.load().await?,
            None => Vec::new(),
        };
        messages.push(Message::human(input));

        info!(history = messages.len() - 1, "Agent run started");

        let conditions = self.conditions();
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut iteration = 0usize;

        loop {
            iteration += 1;

            let context = StopContext {
                iteration,
                steps: &steps,
            };
            if let Some(reason) = conditions.iter().find_map(|c| c.check(&context)) {
                warn!(iteration, reason = %reason, "Stop condition fired");
                let output = format!("execution stopped: {}", reason);
                return self
                    .complete(input, output, steps, iteration - 1, Some(reason), events)
                    .await;
            }

            debug!(iteration, steps = steps.len(), "Planning");
            let actions = match self.plan(&messages, &steps, events).await? {
                AgentDecision::Finish(finish) => {
                    return self
                        .complete(input, finish.output, steps, iteration, None, events)
                        .await;
                }
                AgentDecision::Actions { actions } => actions,
            };

            for action in &actions {
                emit(events, || AgentEvent::ToolStart {
                    action: action.clone(),
                });
            }

            let mut halt = None;
            for outcome in self.act(actions, events).await {
                if halt.is_none() {
                    if let Some(message) = outcome.failure {
                        halt = Some((outcome.step.action.tool_name.clone(), message));
                    }
                }
                steps.push(outcome.step);
            }

            if let Some((tool, message)) = halt.filter(|_| !self.config.continue_on_error) {
                let reason = format!("tool '{}' failed: {}", tool, message);
                warn!(iteration, reason = %reason, "Stopping on tool failure");
                let output = format!("execution stopped: {}", reason);
                return self
                    .complete(input, output, steps, iteration, Some(reason), events)
                    .await;
            }
        }
    }

    async fn plan(
        &self,
        messages: &[Message],
        steps: &[AgentStep],
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<AgentDecision, AgentError> {
        if events.is_none() {
            return self.strategy.plan(messages, steps).await;
        }

        let mut plan = self.strategy.plan_stream(messages, steps).await?;
        while let Some(item) = plan.next().await {
            match item? {
                PlanEvent::Token(content) => emit(events, || AgentEvent::Token { content }),
                PlanEvent::Decision(decision) => return Ok(decision),
            }
        }

        Err(AgentError::StrategyError(
            "plan stream ended without a decision".to_string(),
        ))
    }

    fn requires_confirmation(&self, action: &AgentAction) -> bool {
        self.confirmation.is_some()
            && self
                .registry
                .get(&action.tool_name)
                .map(|tool| tool.schema().requires_confirmation)
                .unwrap_or(false)
    }

    /// Execute one decision's actions, returning outcomes in action order
    async fn act(
        &self,
        actions: Vec<AgentAction>,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Vec<ActionOutcome> {
        let base = ExecutionContext::new(self.config.agent_name.clone());
        let timeout = self.config.tool_timeout();

        let (gated, open): (Vec<_>, Vec<_>) = actions
            .into_iter()
            .enumerate()
            .partition(|(_, action)| self.requires_confirmation(action));

        let mut ordered: Vec<(usize, ActionOutcome)> = Vec::with_capacity(open.len() + gated.len());

        let calls: Vec<ToolCall> = open.iter().map(|(_, a)| a.to_tool_call()).collect();
        let mut results = self
            .registry
            .execute_parallel_with_context(&base, &calls, timeout)
            .await;

        for (index, action) in open {
            let result = results.remove(&action.id).unwrap_or_else(|| {
                ToolResult::failure(action.id.clone(), "no result for call")
            });
            ordered.push((index, observe(action, result, events)));
        }

        for (index, action) in gated {
            let handler = match &self.confirmation {
                Some(handler) => handler,
                None => continue,
            };
            let approved = handler.confirm(&action).await;
            emit(events, || AgentEvent::HumanConfirm {
                action: action.clone(),
                approved,
            });

            let outcome = if approved {
                let context = base.clone().with_call_id(action.id.clone());
                let result = self
                    .registry
                    .execute_with_context(&context, &action.tool_name, action.tool_input.clone(), timeout)
                    .await;
                observe(action, result, events)
            } else {
                info!(tool = %action.tool_name, "Action rejected");
                let step = AgentStep::failed(action, REJECTED_OBSERVATION);
                emit(events, || AgentEvent::ToolEnd {
                    action: step.action.clone(),
                    observation: step.observation.clone(),
                    success: false,
                });
                ActionOutcome {
                    step,
                    failure: None,
                }
            };
            ordered.push((index, outcome));
        }

        ordered.sort_by_key(|(index, _)| *index);
        ordered.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn complete(
        &self,
        input: &str,
        output: String,
        steps: Vec<AgentStep>,
        iterations: usize,
        stopped: Option<String>,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<ExecutorOutput, AgentError> {
        if let Some(memory) = &self.memory {
            memory.save(&turn_messages(input, &steps, &output), &output).await?;
        }

        info!(
            iterations,
            steps = steps.len(),
            stopped = stopped.is_some(),
            "Agent run finished"
        );

        emit(events, || AgentEvent::Finish {
            output: output.clone(),
            steps: steps.clone(),
            stopped: stopped.clone(),
        });

        Ok(ExecutorOutput {
            output,
            steps,
            iterations,
            stopped,
        })
    }
}

/// The invocation as conversation messages: the input, each step as an
/// assistant tool call and its result, then the final output
fn turn_messages(input: &str, steps: &[AgentStep], output: &str) -> Vec<Message> {
    let mut turn = Vec::with_capacity(steps.len() * 2 + 2);
    turn.push(Message::human(input));
    for step in steps {
        let call = step.action.to_tool_call();
        let result = Message::tool(call.id.clone(), call.name.clone(), step.observation.clone());
        turn.push(Message::ai_with_tool_calls(step.action.log.clone(), vec![call]));
        turn.push(result);
    }
    turn.push(Message::ai(output));
    turn
}

fn observe(
    action: AgentAction,
    result: ToolResult,
    events: Option<&UnboundedSender<AgentEvent>>,
) -> ActionOutcome {
    let observation = result.observation();
    if !result.success {
        error!(tool = %action.tool_name, error = ?result.error, "Tool failed");
    }

    emit(events, || AgentEvent::ToolEnd {
        action: action.clone(),
        observation: observation.clone(),
        success: result.success,
    });

    let failure = if result.success {
        None
    } else {
        Some(result.error.unwrap_or_else(|| "unknown error".to_string()))
    };
    let step = AgentStep {
        action,
        observation,
        success: failure.is_none(),
    };

    ActionOutcome { step, failure }
}
