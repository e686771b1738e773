//! Configuration management for deskpilot.
//!
//! Layered the usual way: built-in defaults, then an optional JSON config
//! file under the home directory, then environment variable overrides,
//! then validation of whatever came out.

mod builder;
pub mod constants;
mod defaults;
mod environment;
mod loader;
mod types;
mod validation;

pub use builder::ConfigBuilder;
pub use types::{Config, LlmSettings, RetrievalSettings, WorkflowSettings};

#[cfg(test)]
mod tests;
