//! Common utilities shared between the library, the CLI and the scenario runner

pub mod config;
pub mod error;
pub mod logging;

pub use config::HarnessConfig;
pub use error::{Error, Result};
