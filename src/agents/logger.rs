use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use crate::state::{AgentStep, Metrics, RequestState};
use crate::tokens;

use super::{Agent, StageKind};

fn evaluation(state: &RequestState) -> Value {
    let validation_passed = state.is_safe.unwrap_or(false);
    json!({
        "success": state.answer.is_some() && validation_passed,
        "agents_executed": state.trace.len(),
        "sources_found": state.sources.len(),
        "classification_completed": state.intent.is_some(),
        "retrieval_completed": true,
        "response_generated": state.answer.is_some(),
        "validation_passed": validation_passed,
        "issues": if validation_passed { Vec::new() } else { state.validation_reasons.clone() },
    })
}

/// Final aggregation stage: computes total latency and estimated token
/// usage, then appends its own trace entry. Pure bookkeeping over the
/// accumulated state; there is no external call to fail on.
pub struct LoggerAgent;

impl LoggerAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for LoggerAgent {
    fn kind(&self) -> StageKind {
        StageKind::Log
    }

    async fn execute(&self, mut state: RequestState) -> Result<RequestState> {
        let started = Instant::now();

        let metrics = Metrics {
            latency_ms: state.elapsed_ms(),
            token_usage: tokens::estimate_usage(&state),
        };

        let input = json!({
            "total_steps": state.trace.len(),
            "sources_used": state.sources.len(),
            "response_generated": state.answer.is_some(),
            "validation_passed": state.is_safe.unwrap_or(false),
        });
        let output = json!({
            "final_metrics": {
                "latency_ms": metrics.latency_ms,
                "token_usage": metrics.token_usage,
            },
            "evaluation": evaluation(&state),
        });

        info!(
            request_id = %state.request_id,
            latency_ms = metrics.latency_ms,
            token_usage = metrics.token_usage,
            "request finished"
        );

        state.record_metrics(metrics);
        state.push_step(AgentStep::new(
            self.kind().agent_name(),
            "final_evaluation",
            input,
            output,
            started,
        ));

        Ok(state)
    }
}
