//! Decision strategy contract
//!
//! A strategy looks at the conversation plus the steps taken so far and
//! decides what happens next: run one or more tools, or finish.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use orchestrator_core::{errors::AgentError, AgentDecision, AgentStep, Message};
use orchestrator_providers::{InferenceOutput, StreamEvent, StreamResponse};

/// Item of a streaming plan
#[derive(Debug, Clone, PartialEq)]
pub enum PlanEvent {
    /// Model text as it arrives
    Token(String),

    /// The decision; always the last item
    Decision(AgentDecision),
}

/// Stream of [`PlanEvent`]s ending in exactly one `Decision`
pub type PlanStream = Pin<Box<dyn Stream<Item = Result<PlanEvent, AgentError>> + Send>>;

#[async_trait]
pub trait AgentStrategy: Send + Sync {
    /// Decide the next step
    async fn plan(
        &self,
        messages: &[Message],
        steps: &[AgentStep],
    ) -> Result<AgentDecision, AgentError>;

    /// Decide the next step, surfacing model text as it is produced
    async fn plan_stream(
        &self,
        messages: &[Message],
        steps: &[AgentStep],
    ) -> Result<PlanStream, AgentError>;

    /// Strategy name for logging
    fn name(&self) -> &str;
}

/// Wrap an already computed decision as a plan stream
pub fn buffered_plan(text: &str, decision: AgentDecision) -> PlanStream {
    let mut events = Vec::with_capacity(2);
    if !text.is_empty() {
        events.push(Ok(PlanEvent::Token(text.to_string())));
    }
    events.push(Ok(PlanEvent::Decision(decision)));
    Box::pin(futures::stream::iter(events))
}

/// Re-emit text deltas as tokens, then map the assembled completion to a
/// decision
pub fn streamed_plan<F>(mut completion: StreamResponse, decide: F) -> PlanStream
where
    F: FnOnce(InferenceOutput) -> AgentDecision + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut failure = None;

        while let Some(event) = completion.next().await {
            match event {
                Ok(StreamEvent::TextDelta(delta)) => {
                    content.push_str(&delta);
                    yield Ok(PlanEvent::Token(delta));
                }
                Ok(StreamEvent::ToolCall(call)) => tool_calls.push(call),
                Ok(StreamEvent::Done) => break,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        match failure {
            Some(e) => yield Err(AgentError::from(e)),
            None => {
                let output = InferenceOutput {
                    content,
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                };
                yield Ok(PlanEvent::Decision(decide(output)));
            }
        }
    };

    Box::pin(stream)
}
