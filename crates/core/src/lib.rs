//! # Orchestrator Core
//!
//! Core types and traits for the agent orchestration engine: conversation
//! messages, tool contracts, and the decision/step/event model shared by
//! strategies, executors and the multi-agent layer.

pub mod errors;
pub mod message;
pub mod queue;
pub mod tool;
pub mod types;

pub use errors::*;
pub use message::*;
pub use queue::*;
pub use tool::*;
pub use types::*;
