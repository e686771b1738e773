use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::agents::classifier::Classification;

/// Knowledge document surfaced by the retriever. Ordered descending by
/// `similarity_score`; every surviving candidate scored at or above the
/// configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub id: String,
    pub title: String,
    pub content: String,
    pub similarity_score: f32,
}

/// One committed trace entry per stage. Retries of a stage never duplicate
/// the entry; only the final successful attempt is recorded, with the total
/// attempt count stamped by the stage runner.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub agent_name: String,
    pub step_name: String,
    pub input: Value,
    pub output: Value,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
}

impl AgentStep {
    pub fn new(
        agent_name: impl Into<String>,
        step_name: impl Into<String>,
        input: Value,
        output: Value,
        started: Instant,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            step_name: step_name.into(),
            input,
            output,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Metrics {
    pub latency_ms: u64,
    pub token_usage: u32,
}

/// Shared state for one in-flight request. Exclusively owned by that
/// request's task; stages receive it by value and hand back the mutated
/// copy, so a failed attempt leaves nothing behind.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub request_id: Uuid,
    pub request_text: String,
    pub intent: Option<crate::agents::classifier::Intent>,
    pub sentiment: Option<crate::agents::classifier::Sentiment>,
    pub urgency: Option<crate::agents::classifier::Urgency>,
    pub sources: Vec<Source>,
    pub answer: Option<String>,
    pub is_safe: Option<bool>,
    pub validation_reasons: Vec<String>,
    pub trace: Vec<AgentStep>,
    pub metrics: Metrics,
    started_at: Instant,
}

impl RequestState {
    pub fn new(request_text: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            request_text: request_text.into(),
            intent: None,
            sentiment: None,
            urgency: None,
            sources: Vec::new(),
            answer: None,
            is_safe: None,
            validation_reasons: Vec::new(),
            trace: Vec::new(),
            metrics: Metrics::default(),
            started_at: Instant::now(),
        }
    }

    /// Wall-clock milliseconds since the request state was created. Covers
    /// every attempt of every stage, not just the successful ones.
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn record_classification(&mut self, classification: Classification) {
        debug_assert!(self.intent.is_none(), "classification is write-once");
        self.intent = Some(classification.intent);
        self.sentiment = Some(classification.sentiment);
        self.urgency = Some(classification.urgency);
    }

    pub fn record_sources(&mut self, sources: Vec<Source>) {
        debug_assert!(self.sources.is_empty(), "sources are write-once");
        self.sources = sources;
    }

    pub fn record_answer(&mut self, answer: impl Into<String>) {
        debug_assert!(self.answer.is_none(), "answer is write-once");
        self.answer = Some(answer.into());
    }

    pub fn record_validation(&mut self, is_safe: bool, reasons: Vec<String>) {
        debug_assert!(self.is_safe.is_none(), "validation verdict is write-once");
        self.is_safe = Some(is_safe);
        self.validation_reasons = reasons;
    }

    pub fn record_metrics(&mut self, metrics: Metrics) {
        self.metrics = metrics;
    }

    pub fn push_step(&mut self, step: AgentStep) {
        debug_assert!(
            !self
                .trace
                .iter()
                .any(|existing| existing.agent_name == step.agent_name),
            "at most one trace entry per agent"
        );
        self.trace.push(step);
    }

    /// Stamp the total attempt count on the step the named agent just
    /// committed. Called by the stage runner before the state becomes
    /// visible to later stages.
    pub fn stamp_attempts(&mut self, agent_name: &str, attempts: u32) {
        if let Some(step) = self.trace.last_mut() {
            if step.agent_name == agent_name {
                step.attempts = attempts;
            }
        }
    }
}
