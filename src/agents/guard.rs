use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::client::{ChatMessage, ChatProvider};
use crate::state::{AgentStep, RequestState};

use super::parsing::extract_json_object;
use super::{Agent, StageKind};

const GUARD_SYSTEM_PROMPT: &str = r#"You are a safety and compliance validator for customer support responses. Analyze the generated response and check for:

1. Safety issues: harmful content, inappropriate language, personal information exposure, security risks.
2. Hallucinations: claims not supported by the provided knowledge sources, made-up facts, contradictory statements.
3. Policy compliance: promises that cannot be kept, financial commitments beyond authority, legal or regulatory issues.
4. Quality issues: incomplete information, unclear language, missing important context.

OUTPUT FORMAT (MUST FOLLOW EXACTLY)
- Return a single JSON object with exactly these keys:
  - "is_safe": boolean, true only if the response passes every check
  - "issues": array of strings describing each problem found (empty if none)
  - "confidence": number between 0 and 1
- No other keys, no explanations, no trailing text.

ALLOWED OUTPUT SHAPE (the only shape):
{"is_safe":true,"issues":[],"confidence":0.9}
"#;

const PARSE_FAILURE_REASON: &str = "Validation output could not be parsed";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Verdict {
    pub is_safe: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug)]
pub(crate) enum GuardOutput {
    Parsed(Verdict),
    Malformed { raw: String },
}

pub(crate) fn parse_verdict(raw: &str) -> GuardOutput {
    let Some(fragment) = extract_json_object(raw) else {
        return GuardOutput::Malformed {
            raw: raw.to_string(),
        };
    };
    match serde_json::from_str::<Verdict>(&fragment) {
        Ok(verdict) => GuardOutput::Parsed(verdict),
        Err(_) => GuardOutput::Malformed {
            raw: raw.to_string(),
        },
    }
}

/// Validates the drafted answer against the sources. Parse failures are
/// fail-closed: ambiguity never defaults to "safe". Transport failures
/// propagate so the runner can retry.
pub struct GuardAgent {
    chat: Arc<dyn ChatProvider>,
}

impl GuardAgent {
    pub fn new(chat: Arc<dyn ChatProvider>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Agent for GuardAgent {
    fn kind(&self) -> StageKind {
        StageKind::Validate
    }

    async fn execute(&self, mut state: RequestState) -> Result<RequestState> {
        let started = Instant::now();

        let answer = state.answer.clone().unwrap_or_default();
        let sources: Vec<_> = state
            .sources
            .iter()
            .map(|source| json!({ "title": source.title, "content": source.content }))
            .collect();

        let user_prompt = format!(
            "Original Request:\n{}\n\nGenerated Response:\n{}\n\nAvailable Knowledge Sources:\n{}\n\nPlease validate this response:",
            state.request_text,
            answer,
            serde_json::to_string_pretty(&sources).unwrap_or_else(|_| "[]".to_string()),
        );

        let messages = [
            ChatMessage::system(GUARD_SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ];

        let raw = self
            .chat
            .chat(&messages)
            .await
            .context("Guard chat call failed")?;

        let (is_safe, reasons, output) = match parse_verdict(&raw) {
            GuardOutput::Parsed(verdict) => {
                let output = json!({
                    "is_safe": verdict.is_safe,
                    "issues": verdict.issues.clone(),
                    "confidence": verdict.confidence,
                });
                (verdict.is_safe, verdict.issues, output)
            }
            GuardOutput::Malformed { raw } => {
                warn!(
                    request_id = %state.request_id,
                    "guard output was not valid JSON; failing closed"
                );
                let reasons = vec![PARSE_FAILURE_REASON.to_string()];
                let output = json!({
                    "is_safe": false,
                    "issues": reasons.clone(),
                    "parse_error": raw,
                });
                (false, reasons, output)
            }
        };

        let input = json!({
            "request_text": state.request_text,
            "response_length": answer.len(),
            "sources_count": state.sources.len(),
        });
        state.record_validation(is_safe, reasons);
        state.push_step(AgentStep::new(
            self.kind().agent_name(),
            "validate_response",
            input,
            output,
            started,
        ));

        Ok(state)
    }
}
