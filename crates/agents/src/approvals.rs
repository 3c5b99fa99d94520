//! Human-in-the-loop confirmation for gated tools
//!
//! Tools whose schema sets `requires_confirmation` are only executed after
//! the attached [`ConfirmationHandler`] approves the concrete action. With
//! no handler attached, gated tools run like any other tool.

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use orchestrator_core::AgentAction;

/// Observation recorded when a gated action is rejected
pub const REJECTED_OBSERVATION: &str = "user rejected";

#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    /// Return `true` to run the action
    async fn confirm(&self, action: &AgentAction) -> bool;
}

/// Confirmation handler backed by an async closure
pub struct FnConfirmation {
    f: Box<dyn Fn(AgentAction) -> BoxFuture<'static, bool> + Send + Sync>,
}

impl FnConfirmation {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(AgentAction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            f: Box::new(move |action| Box::pin(f(action))),
        }
    }

    /// Handler that answers every request the same way
    pub fn always(approved: bool) -> Self {
        Self::new(move |_| async move { approved })
    }
}

#[async_trait]
impl ConfirmationHandler for FnConfirmation {
    async fn confirm(&self, action: &AgentAction) -> bool {
        (self.f)(action.clone()).await
    }
}
