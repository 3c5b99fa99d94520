//! # Tools
//!
//! Registry, input validation and timed execution for agent tools.
//!
//! - [`ToolRegistry`] - name-keyed registry with single and parallel execution
//! - [`validate_input`] - schema checks applied before any tool body runs
//! - [`FnTool`] / [`tool_fn`] - build a tool from an async closure

pub use orchestrator_core::tool::*;

pub mod fn_tool;
pub mod registry;
pub mod validation;

pub use fn_tool::*;
pub use registry::*;
pub use validation::*;
