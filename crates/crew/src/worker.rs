//! Workers: a named strategy plus the tools it may use

use std::sync::Arc;

use orchestrator_agents::{
    AgentExecutor, AgentStrategy, ExecutorConfig, ReActAgent, ReActConfig, ToolCallingAgent,
    ToolCallingConfig,
};
use orchestrator_providers::LLMBackend;
use orchestrator_tools::ToolRegistry;

use crate::types::WorkerConfig;

/// A worker the supervisor can route to
///
/// Each invocation gets a fresh [`AgentExecutor`], so workers carry no
/// conversation state between sub-tasks.
#[derive(Clone)]
pub struct Worker {
    pub config: WorkerConfig,
    strategy: Arc<dyn AgentStrategy>,
    registry: Arc<ToolRegistry>,
    executor_config: ExecutorConfig,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        strategy: Arc<dyn AgentStrategy>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let executor_config = ExecutorConfig::default().with_agent_name(config.name.clone());
        Self {
            config,
            strategy,
            registry,
            executor_config,
        }
    }

    /// Worker backed by native function calling
    pub fn tool_calling(
        config: WorkerConfig,
        backend: Arc<dyn LLMBackend>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let mut agent_config = ToolCallingConfig::default();
        if let Some(prompt) = &config.system_prompt {
            agent_config = agent_config.with_system_prompt(prompt.clone());
        }
        let strategy = ToolCallingAgent::new(backend, registry.clone()).with_config(agent_config);
        Self::new(config, Arc::new(strategy), registry)
    }

    /// Worker backed by the ReAct text protocol
    pub fn react(
        config: WorkerConfig,
        backend: Arc<dyn LLMBackend>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let mut agent_config = ReActConfig::default();
        if let Some(prompt) = &config.system_prompt {
            agent_config = agent_config.with_system_prompt(prompt.clone());
        }
        let strategy = ReActAgent::new(backend, registry.clone()).with_config(agent_config);
        Self::new(config, Arc::new(strategy), registry)
    }

    /// Override executor settings; the agent name always stays the worker's
    pub fn with_executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = config.with_agent_name(self.config.name.clone());
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn executor(&self) -> AgentExecutor {
        AgentExecutor::new(self.strategy.clone(), self.registry.clone())
            .with_config(self.executor_config.clone())
    }
}
