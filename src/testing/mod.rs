//! YAML scenario runner
//!
//! Lets a tool's behaviour be pinned down in data files instead of Rust
//! tests. Each scenario names a fixture, the argument template and the
//! assertions to apply to the result.

mod config;
mod runner;

pub use config::*;
pub use runner::{run_scenario, TestResult};
