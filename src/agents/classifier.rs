use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::client::{ChatMessage, ChatProvider};
use crate::state::{AgentStep, RequestState};

use super::parsing::extract_json_object;
use super::{Agent, StageKind};

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a STRICT JSON classifier for customer support requests.

TASK
- Classify the customer's message along three axes.

1. "intent" - what kind of request is this? One of:
   - "technical_issue" - problems with software or hardware functionality
   - "billing" - payments, subscriptions, refunds
   - "general_question" - general information requests
   - "feature_request" - suggestions for new features
   - "complaint" - expressions of dissatisfaction
   - "account_issue" - login, access, or account settings problems

2. "sentiment" - the emotional tone. One of:
   - "positive" - happy, satisfied, pleased
   - "neutral" - factual, informational, calm
   - "negative" - angry, frustrated, disappointed

3. "urgency" - how quickly this needs attention. One of:
   - "high" - critical or blocking, needs immediate attention
   - "medium" - important but not blocking
   - "low" - general inquiry, standard response time is fine

OUTPUT FORMAT (MUST FOLLOW EXACTLY)
- Return a single JSON object with exactly the keys "intent", "sentiment", "urgency".
- Values must be drawn from the lists above. No other keys, no explanations, no trailing text.

ALLOWED OUTPUT SHAPE (the only shape):
{"intent":"general_question","sentiment":"neutral","urgency":"medium"}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TechnicalIssue,
    Billing,
    GeneralQuestion,
    FeatureRequest,
    Complaint,
    AccountIssue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Classification {
    pub intent: Intent,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            intent: Intent::GeneralQuestion,
            sentiment: Sentiment::Neutral,
            urgency: Urgency::Medium,
        }
    }
}

/// Tagged model output: either typed fields or the raw text we could not
/// parse. The recovery policy (default-substitute) is decided over this,
/// not over an exception path.
#[derive(Debug)]
pub(crate) enum ClassifierOutput {
    Parsed(Classification),
    Malformed { raw: String },
}

pub(crate) fn parse_classification(raw: &str) -> ClassifierOutput {
    let Some(fragment) = extract_json_object(raw) else {
        return ClassifierOutput::Malformed {
            raw: raw.to_string(),
        };
    };
    match serde_json::from_str::<Classification>(&fragment) {
        Ok(classification) => ClassifierOutput::Parsed(classification),
        Err(_) => ClassifierOutput::Malformed {
            raw: raw.to_string(),
        },
    }
}

/// Classifies the request by intent, sentiment, and urgency. Unparsable
/// model output is a local recovery (safe defaults), never a retry trigger;
/// transport failures propagate so the stage runner can retry.
pub struct ClassifierAgent {
    chat: Arc<dyn ChatProvider>,
}

impl ClassifierAgent {
    pub fn new(chat: Arc<dyn ChatProvider>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Agent for ClassifierAgent {
    fn kind(&self) -> StageKind {
        StageKind::Classify
    }

    async fn execute(&self, mut state: RequestState) -> Result<RequestState> {
        let started = Instant::now();

        let messages = [
            ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Please classify this support request:\n\n{}",
                state.request_text
            )),
        ];

        let raw = self
            .chat
            .chat(&messages)
            .await
            .context("Classifier chat call failed")?;

        let (classification, output) = match parse_classification(&raw) {
            ClassifierOutput::Parsed(classification) => (
                classification,
                serde_json::to_value(classification).unwrap_or_default(),
            ),
            ClassifierOutput::Malformed { raw } => {
                warn!(
                    request_id = %state.request_id,
                    "classifier output was not valid JSON; substituting defaults"
                );
                let defaults = Classification::default();
                let mut output = serde_json::to_value(defaults).unwrap_or_default();
                if let Some(map) = output.as_object_mut() {
                    map.insert("parse_error".to_string(), json!(raw));
                }
                (defaults, output)
            }
        };

        let input = json!({ "request_text": state.request_text });
        state.record_classification(classification);
        state.push_step(AgentStep::new(
            self.kind().agent_name(),
            "classify_request",
            input,
            output,
            started,
        ));

        Ok(state)
    }
}
