use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::agents::classifier::ClassifierAgent;
use crate::agents::guard::GuardAgent;
use crate::agents::logger::LoggerAgent;
use crate::agents::retriever::RetrieverAgent;
use crate::agents::writer::WriterAgent;
use crate::agents::{Agent, StageKind};
use crate::client::{ChatProvider, EmbeddingProvider};
use crate::config::Config;
use crate::state::RequestState;
use crate::store::VectorStore;

use super::outcome::{WorkflowError, WorkflowResponse};
use super::runner::{StageOutcome, run_stage};

/// Per-request state machine position. One instance per request; there are
/// no back-edges, so a failed validation flows forward as data instead of
/// re-entering the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Pending,
    Running(StageKind),
    Succeeded,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Pending => write!(f, "pending"),
            WorkflowStatus::Running(stage) => write!(f, "running({stage})"),
            WorkflowStatus::Succeeded => write!(f, "succeeded"),
            WorkflowStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The fixed classify → retrieve → write → validate → log pipeline, with
/// the timeout/retry wrapper applied to every stage. Shareable across
/// concurrent requests; each request owns its own state.
pub struct Workflow {
    agents: Vec<Box<dyn Agent>>,
    step_timeout: Duration,
    max_attempts: u32,
}

impl Workflow {
    /// Wire up the standard five agents against the given providers.
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: &Config,
    ) -> Self {
        Self::builder()
            .stage(ClassifierAgent::new(chat.clone()))
            .stage(RetrieverAgent::new(embeddings, store, &config.retrieval))
            .stage(WriterAgent::new(chat.clone()))
            .stage(GuardAgent::new(chat))
            .stage(LoggerAgent::new())
            .step_timeout(Duration::from_secs(config.workflow.step_timeout_seconds))
            .max_attempts(config.workflow.max_retries)
            .build()
    }

    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    pub fn stage_count(&self) -> usize {
        self.agents.len()
    }

    /// Process one support request through the complete pipeline.
    ///
    /// Empty or whitespace-only text is rejected before any stage runs.
    /// A stage that exhausts its attempt budget aborts the request with a
    /// single opaque error and no partial trace; stage-internal degradation
    /// (empty sources, fallback answer, `is_safe == false`) still yields a
    /// complete response.
    pub async fn process(&self, request_text: &str) -> Result<WorkflowResponse, WorkflowError> {
        if request_text.trim().is_empty() {
            return Err(WorkflowError::EmptyRequest);
        }

        let mut state = RequestState::new(request_text);
        let request_id = state.request_id;
        let mut status = WorkflowStatus::Pending;
        info!(%request_id, status = %status, "processing support request");

        for agent in &self.agents {
            let kind = agent.kind();
            status = WorkflowStatus::Running(kind);
            debug!(%request_id, status = %status, "stage started");

            match run_stage(agent.as_ref(), &state, self.step_timeout, self.max_attempts).await {
                StageOutcome::Success {
                    state: next,
                    attempts,
                } => {
                    debug!(%request_id, stage = %kind, attempts, "stage completed");
                    state = next;
                }
                StageOutcome::Failure { error, attempts } => {
                    status = WorkflowStatus::Failed;
                    error!(
                        %request_id,
                        status = %status,
                        stage = %kind,
                        attempts,
                        error = %error,
                        "stage exhausted its attempts; aborting request"
                    );
                    return Err(WorkflowError::Internal {
                        stage: kind,
                        attempts,
                        source: error,
                    });
                }
            }
        }

        status = WorkflowStatus::Succeeded;
        info!(
            %request_id,
            status = %status,
            latency_ms = state.metrics.latency_ms,
            "request completed"
        );
        Ok(WorkflowResponse::from(state))
    }
}

pub struct WorkflowBuilder {
    agents: Vec<Box<dyn Agent>>,
    step_timeout: Duration,
    max_attempts: u32,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            step_timeout: Duration::from_secs(
                crate::config::constants::DEFAULT_STEP_TIMEOUT_SECONDS,
            ),
            max_attempts: crate::config::constants::DEFAULT_MAX_RETRIES,
        }
    }

    pub fn stage<A>(mut self, agent: A) -> Self
    where
        A: Agent + 'static,
    {
        self.agents.push(Box::new(agent));
        self
    }

    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn build(self) -> Workflow {
        Workflow {
            agents: self.agents,
            step_timeout: self.step_timeout,
            max_attempts: self.max_attempts,
        }
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}
