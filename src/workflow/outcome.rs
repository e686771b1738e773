use serde::Serialize;
use thiserror::Error;

use crate::agents::StageKind;
use crate::state::{AgentStep, Metrics, RequestState, Source};

/// Externally visible result of a successful run: the final request state
/// reduced to what the transport layer returns to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub trace: Vec<AgentStep>,
    pub metrics: Metrics,
}

impl From<RequestState> for WorkflowResponse {
    fn from(state: RequestState) -> Self {
        Self {
            answer: state
                .answer
                .unwrap_or_else(|| "No response generated.".to_string()),
            sources: state.sources,
            trace: state.trace,
            metrics: state.metrics,
        }
    }
}

/// Boundary error for [`crate::workflow::Workflow::process`]. The transport
/// layer maps `EmptyRequest` to its input-validation code and `Internal` to
/// a generic workflow error; the stage and attempt count are carried for
/// logs, not for the caller-facing message.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("request_text must not be empty")]
    EmptyRequest,

    #[error("an internal error occurred while processing the request")]
    Internal {
        stage: StageKind,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}
