use std::time::Duration;

use anyhow::anyhow;
use tokio::time::timeout;
use tracing::warn;

use crate::agents::Agent;
use crate::state::RequestState;

/// Result of driving one stage through the timeout/retry wrapper. The
/// orchestrator only inspects this type; raw errors never cross it on the
/// success path.
#[derive(Debug)]
pub enum StageOutcome {
    Success {
        state: RequestState,
        attempts: u32,
    },
    Failure {
        error: anyhow::Error,
        attempts: u32,
    },
}

/// Execute one stage under a deadline, retrying up to `max_attempts` total
/// attempts. Every attempt starts from a clone of the pre-stage state, so a
/// failed or timed-out attempt leaves no partial progress behind; dropping
/// the attempt future cancels its in-flight external call.
pub async fn run_stage(
    agent: &dyn Agent,
    state: &RequestState,
    step_timeout: Duration,
    max_attempts: u32,
) -> StageOutcome {
    let budget = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=budget {
        let attempt_state = state.clone();
        match timeout(step_timeout, agent.execute(attempt_state)).await {
            Ok(Ok(mut next)) => {
                next.stamp_attempts(agent.kind().agent_name(), attempt);
                return StageOutcome::Success {
                    state: next,
                    attempts: attempt,
                };
            }
            Ok(Err(error)) => {
                warn!(
                    request_id = %state.request_id,
                    stage = %agent.kind(),
                    attempt,
                    error = %error,
                    "stage attempt failed"
                );
                last_error = Some(error);
            }
            Err(_) => {
                warn!(
                    request_id = %state.request_id,
                    stage = %agent.kind(),
                    attempt,
                    timeout_ms = step_timeout.as_millis() as u64,
                    "stage attempt timed out"
                );
                last_error = Some(anyhow!(
                    "{} stage timed out after {:?}",
                    agent.kind(),
                    step_timeout
                ));
            }
        }
    }

    StageOutcome::Failure {
        error: last_error.unwrap_or_else(|| anyhow!("stage made no attempts")),
        attempts: budget,
    }
}
