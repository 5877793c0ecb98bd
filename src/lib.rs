//! CLI harness - out-of-process testing for command-line tools
//!
//! This library copies fixture projects into isolated directories, runs a
//! tool against them as a child process under a bounded timeout, and
//! exposes assertions over the captured exit code and output.

pub mod cli;
pub mod commands;
pub mod common;
pub mod harness;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, HarnessConfig, Result};
pub use harness::{ExecutionResult, Harness, IsolatedProject};
