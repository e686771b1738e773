pub mod orchestrator;
pub mod outcome;
pub mod runner;

pub use orchestrator::{Workflow, WorkflowBuilder, WorkflowStatus};
pub use outcome::{WorkflowError, WorkflowResponse};
pub use runner::{StageOutcome, run_stage};

#[cfg(test)]
mod tests;
