pub mod classifier;
pub mod guard;
pub mod logger;
pub(crate) mod parsing;
pub mod retriever;
pub mod writer;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::state::RequestState;

/// The five fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Classify,
    Retrieve,
    Write,
    Validate,
    Log,
}

impl StageKind {
    pub const ORDER: [StageKind; 5] = [
        StageKind::Classify,
        StageKind::Retrieve,
        StageKind::Write,
        StageKind::Validate,
        StageKind::Log,
    ];

    pub fn agent_name(self) -> &'static str {
        match self {
            StageKind::Classify => "ClassifierAgent",
            StageKind::Retrieve => "RetrieverAgent",
            StageKind::Write => "WriterAgent",
            StageKind::Validate => "GuardAgent",
            StageKind::Log => "LoggerAgent",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageKind::Classify => "classify",
            StageKind::Retrieve => "retrieve",
            StageKind::Write => "write",
            StageKind::Validate => "validate",
            StageKind::Log => "log",
        };
        write!(f, "{label}")
    }
}

/// One pipeline stage. Stages take the request state by value and return
/// the mutated copy; an `Err` means the attempt produced nothing, so the
/// runner can retry from the pre-stage snapshot.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn execute(&self, state: RequestState) -> Result<RequestState>;
}
