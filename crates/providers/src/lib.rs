//! # Completion Service Contract
//!
//! The [`LLMBackend`] trait is the only way the orchestration engine talks
//! to a language model. Vendor clients live outside this workspace and
//! implement the trait; [`MockBackend`] provides scripted responses for
//! tests and examples.

pub mod backend;
pub mod mock;

pub use backend::*;
pub use mock::{MessageMatcher, MockBackend, MockResponse, RecordedCall};
