//! # Crew
//!
//! Supervisor/worker orchestration on top of the single-agent executor.
//!
//! A [`Supervisor`] reads the task and the results so far and routes the
//! next sub-task to a [`Worker`]. [`MultiAgentExecutor`] runs that loop one
//! worker at a time until the supervisor answers `FINISH` or the iteration
//! budget runs out.

pub mod multi_agent;
pub mod supervisor;
pub mod types;
pub mod worker;

pub use multi_agent::*;
pub use supervisor::*;
pub use types::*;
pub use worker::*;
