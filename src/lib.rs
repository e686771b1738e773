//! Core orchestration engine for the deskpilot support copilot.
//!
//! A free-text support request flows through five fixed stages
//! (classify, retrieve, write, validate, log), each backed by a chat
//! completion, an embedding lookup, or a vector search. The transport
//! layer consumes [`workflow::Workflow::process`] and maps its errors to
//! HTTP status codes; everything HTTP-shaped lives outside this crate.

pub mod agents;
pub mod cli;
pub mod client;
pub mod config;
pub mod state;
pub mod store;
pub mod tokens;
pub mod workflow;

pub use state::{AgentStep, Metrics, RequestState, Source};
pub use workflow::{Workflow, WorkflowError, WorkflowResponse};
