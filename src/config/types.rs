use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub llm: LlmSettings,
    pub workflow: WorkflowSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Total attempt budget per stage, timeout included.
    pub max_retries: u32,
    pub step_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub similarity_threshold: f32,
    pub top_k: usize,
}

// File configuration types

#[derive(Debug, Deserialize)]
pub(super) struct FileConfig {
    #[serde(default)]
    pub llm: Option<FileLlmSettings>,
    #[serde(default)]
    pub workflow: Option<FileWorkflowSettings>,
    #[serde(default)]
    pub retrieval: Option<FileRetrievalSettings>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FileLlmSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FileWorkflowSettings {
    pub max_retries: Option<u32>,
    pub step_timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FileRetrievalSettings {
    pub similarity_threshold: Option<f32>,
    pub top_k: Option<usize>,
}

// Serialization helpers

#[derive(Serialize)]
pub(super) struct PersistedConfig<'a> {
    pub llm: PersistedLlm<'a>,
    pub workflow: PersistedWorkflow,
    pub retrieval: PersistedRetrieval,
}

#[derive(Serialize)]
pub(super) struct PersistedLlm<'a> {
    pub api_key: &'a str,
    pub base_url: &'a str,
    pub chat_model: &'a str,
    pub embedding_model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub user_agent: &'a str,
}

#[derive(Serialize)]
pub(super) struct PersistedWorkflow {
    pub max_retries: u32,
    pub step_timeout_seconds: u64,
}

#[derive(Serialize)]
pub(super) struct PersistedRetrieval {
    pub similarity_threshold: f32,
    pub top_k: usize,
}

impl<'a> From<&'a Config> for PersistedConfig<'a> {
    fn from(config: &'a Config) -> Self {
        PersistedConfig {
            llm: PersistedLlm {
                api_key: &config.llm.api_key,
                base_url: &config.llm.base_url,
                chat_model: &config.llm.chat_model,
                embedding_model: &config.llm.embedding_model,
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
                timeout_secs: config.llm.timeout_secs,
                user_agent: &config.llm.user_agent,
            },
            workflow: PersistedWorkflow {
                max_retries: config.workflow.max_retries,
                step_timeout_seconds: config.workflow.step_timeout_seconds,
            },
            retrieval: PersistedRetrieval {
                similarity_threshold: config.retrieval.similarity_threshold,
                top_k: config.retrieval.top_k,
            },
        }
    }
}
