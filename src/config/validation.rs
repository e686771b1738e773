use anyhow::{Result, anyhow};

use super::types::Config;

pub fn validate(config: &Config) -> Result<()> {
    if config.llm.api_key.trim().is_empty() {
        return Err(anyhow!(
            "API key not found. Set DESKPILOT_API_KEY (or OPENAI_API_KEY) or add it to {}",
            Config::config_path()?.display()
        ));
    }

    if !(0.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        return Err(anyhow!(
            "similarity_threshold must be between 0 and 1, got {}",
            config.retrieval.similarity_threshold
        ));
    }

    if config.retrieval.top_k == 0 {
        return Err(anyhow!("top_k must be at least 1"));
    }

    if config.workflow.max_retries == 0 {
        return Err(anyhow!("max_retries must be at least 1"));
    }

    if config.workflow.step_timeout_seconds == 0 {
        return Err(anyhow!("step_timeout_seconds must be at least 1"));
    }

    Ok(())
}
