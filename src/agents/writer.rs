use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::client::{ChatMessage, ChatProvider};
use crate::state::{AgentStep, RequestState};

use super::{Agent, StageKind};

const WRITER_SYSTEM_PROMPT: &str = "You are a helpful customer support agent. \
Write a professional, empathetic response using the provided knowledge sources. \
Be concise, actionable, and address the customer's specific intent and urgency. \
Ground every claim in the sources when sources are given.";

const NO_SOURCES_INSTRUCTION: &str = "No knowledge sources were found for this request. \
You may still answer from general knowledge, but you must clearly state that the reply \
is not based on our documentation and suggest contacting support for specifics. \
Do not refuse to answer.";

const FALLBACK_ANSWER: &str = "I apologize, but I'm unable to generate a response at this \
moment. Please try again or contact our support team directly.";

fn classification_label<T: serde::Serialize>(value: &Option<T>) -> String {
    value
        .as_ref()
        .and_then(|v| serde_json::to_value(v).ok())
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn build_user_prompt(state: &RequestState) -> String {
    let mut prompt = format!(
        "Customer Request:\n{}\n\nClassification:\n- Intent: {}\n- Sentiment: {}\n- Urgency: {}\n",
        state.request_text,
        classification_label(&state.intent),
        classification_label(&state.sentiment),
        classification_label(&state.urgency),
    );

    if state.sources.is_empty() {
        prompt.push('\n');
        prompt.push_str(NO_SOURCES_INSTRUCTION);
        prompt.push('\n');
    } else {
        prompt.push_str("\nKnowledge Sources:\n");
        for (index, source) in state.sources.iter().enumerate() {
            let _ = write!(
                prompt,
                "\n{}. {}\n{}\n",
                index + 1,
                source.title,
                source.content
            );
        }
    }

    prompt.push_str("\nPlease write a helpful response:");
    prompt
}

fn preview(text: &str) -> String {
    if text.chars().count() > 200 {
        let truncated: String = text.chars().take(200).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

/// Drafts the customer-facing reply, grounded on the retrieved sources.
/// A blank completion is a content error recovered locally with a generic
/// apology; transport failures propagate so the runner can retry.
pub struct WriterAgent {
    chat: Arc<dyn ChatProvider>,
}

impl WriterAgent {
    pub fn new(chat: Arc<dyn ChatProvider>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Agent for WriterAgent {
    fn kind(&self) -> StageKind {
        StageKind::Write
    }

    async fn execute(&self, mut state: RequestState) -> Result<RequestState> {
        let started = Instant::now();

        let messages = [
            ChatMessage::system(WRITER_SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(&state)),
        ];

        let raw = self
            .chat
            .chat(&messages)
            .await
            .context("Writer chat call failed")?;

        let trimmed = raw.trim();
        let (answer, degraded) = if trimmed.is_empty() {
            warn!(
                request_id = %state.request_id,
                "writer returned a blank completion; substituting fallback answer"
            );
            (FALLBACK_ANSWER.to_string(), true)
        } else {
            (trimmed.to_string(), false)
        };

        let input = json!({
            "request_text": state.request_text,
            "intent": state.intent,
            "sources_count": state.sources.len(),
        });
        let output = json!({
            "response_length": answer.len(),
            "response_preview": preview(&answer),
            "degraded": degraded,
        });

        state.record_answer(answer);
        state.push_step(AgentStep::new(
            self.kind().agent_name(),
            "generate_response",
            input,
            output,
            started,
        ));

        Ok(state)
    }
}
