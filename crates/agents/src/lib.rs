//! # Agents
//!
//! The single-agent decision loop: strategies that turn a conversation into
//! a decision, the executor that acts on those decisions, and the memories
//! that carry history between invocations.

pub mod approvals;
pub mod executor;
pub mod memory;
pub mod persistence;
pub mod react;
pub mod stop;
pub mod strategy;
pub mod tool_calling;

pub use approvals::*;
pub use executor::*;
pub use memory::*;
pub use persistence::*;
pub use react::*;
pub use stop::*;
pub use strategy::*;
pub use tool_calling::*;
