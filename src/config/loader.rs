use std::{fs, path::Path};

use anyhow::{Context, Result};
use dirs::home_dir;

use super::Config;
use super::builder::ConfigBuilder;
use super::environment::apply_env_overrides;
use super::types::{FileConfig, PersistedConfig};
use super::validation::validate;

impl Config {
    pub fn config_path() -> Result<std::path::PathBuf> {
        let mut path = home_dir().context("Could not determine home directory")?;
        path.push(".deskpilot/config");
        Ok(path)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut builder = ConfigBuilder::new();

        if path.exists() {
            builder = Self::apply_file(builder, &path)?;
        }

        builder = apply_env_overrides(builder)?;

        let config = builder.build()?;
        validate(&config)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Unable to create config directory {}", parent.display())
            })?;
        }

        let payload = PersistedConfig::from(self);
        let json = serde_json::to_string_pretty(&payload)
            .context("Failed to serialize configuration to JSON")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate(self)
    }

    pub(super) fn apply_file(mut builder: ConfigBuilder, path: &Path) -> Result<ConfigBuilder> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file: FileConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if let Some(llm) = file.llm {
            builder = builder.with_llm(|settings| {
                if let Some(api_key) = llm.api_key {
                    settings.api_key = api_key;
                }
                if let Some(base_url) = llm.base_url {
                    settings.base_url = base_url;
                }
                if let Some(chat_model) = llm.chat_model {
                    settings.chat_model = chat_model;
                }
                if let Some(embedding_model) = llm.embedding_model {
                    settings.embedding_model = embedding_model;
                }
                if let Some(max_tokens) = llm.max_tokens {
                    settings.max_tokens = max_tokens;
                }
                if let Some(temperature) = llm.temperature {
                    settings.temperature = temperature;
                }
                if let Some(timeout_secs) = llm.timeout_secs {
                    settings.timeout_secs = timeout_secs;
                }
                if let Some(user_agent) = llm.user_agent {
                    settings.user_agent = user_agent;
                }
            });
        }

        if let Some(workflow) = file.workflow {
            builder = builder.with_workflow(|settings| {
                if let Some(max_retries) = workflow.max_retries {
                    settings.max_retries = max_retries;
                }
                if let Some(step_timeout) = workflow.step_timeout_seconds {
                    settings.step_timeout_seconds = step_timeout;
                }
            });
        }

        if let Some(retrieval) = file.retrieval {
            builder = builder.with_retrieval(|settings| {
                if let Some(threshold) = retrieval.similarity_threshold {
                    settings.similarity_threshold = threshold;
                }
                if let Some(top_k) = retrieval.top_k {
                    settings.top_k = top_k;
                }
            });
        }

        Ok(builder)
    }
}
