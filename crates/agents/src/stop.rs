//! Stop conditions evaluated before every planning call

use orchestrator_core::AgentStep;

/// State visible to a stop condition
#[derive(Debug, Clone, Copy)]
pub struct StopContext<'a> {
    /// 1-based number of the iteration about to plan
    pub iteration: usize,

    /// Steps recorded so far
    pub steps: &'a [AgentStep],
}

/// Ends a run early; returns the reason when it fires
pub trait StopCondition: Send + Sync {
    fn check(&self, context: &StopContext<'_>) -> Option<String>;
}

/// Fires once more than `n` iterations would run
#[derive(Debug, Clone, Copy)]
pub struct MaxIterations(pub usize);

impl StopCondition for MaxIterations {
    fn check(&self, context: &StopContext<'_>) -> Option<String> {
        (context.iteration > self.0).then(|| format!("max iterations ({}) reached", self.0))
    }
}

/// Fires when the last `k` steps called the same tool with the same input
#[derive(Debug, Clone, Copy)]
pub struct RepeatedAction(pub usize);

impl StopCondition for RepeatedAction {
    fn check(&self, context: &StopContext<'_>) -> Option<String> {
        let k = self.0;
        if k < 2 || context.steps.len() < k {
            return None;
        }

        let recent = &context.steps[context.steps.len() - k..];
        let first = recent[0].action.signature();
        recent
            .iter()
            .all(|step| step.action.signature() == first)
            .then(|| {
                format!(
                    "repeated action '{}' {} times",
                    recent[0].action.tool_name, k
                )
            })
    }
}
