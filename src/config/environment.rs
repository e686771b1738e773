use std::env;

use anyhow::{Context, Result, anyhow};

use super::builder::ConfigBuilder;

pub fn apply_env_overrides(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Some(api_key) = env_string("DESKPILOT_API_KEY")? {
        builder = builder.with_llm(|llm| llm.api_key = api_key.clone());
    } else if let Some(api_key) = env_string("OPENAI_API_KEY")? {
        builder = builder.with_llm(|llm| llm.api_key = api_key.clone());
    }

    if let Some(base_url) = env_string("DESKPILOT_BASE_URL")? {
        builder = builder.with_llm(|llm| llm.base_url = base_url.clone());
    }

    if let Some(chat_model) = env_string("DESKPILOT_CHAT_MODEL")? {
        builder = builder.with_llm(|llm| llm.chat_model = chat_model.clone());
    }

    if let Some(embedding_model) = env_string("DESKPILOT_EMBEDDING_MODEL")? {
        builder = builder.with_llm(|llm| llm.embedding_model = embedding_model.clone());
    }

    if let Some(timeout) = env_u64("DESKPILOT_TIMEOUT_SECS")? {
        builder = builder.with_llm(|llm| llm.timeout_secs = timeout);
    }

    if let Some(max_tokens) = env_u32("DESKPILOT_MAX_TOKENS")? {
        builder = builder.with_llm(|llm| llm.max_tokens = max_tokens);
    }

    if let Some(max_retries) = env_u32("DESKPILOT_MAX_RETRIES")? {
        builder = builder.with_workflow(|workflow| workflow.max_retries = max_retries);
    }

    if let Some(step_timeout) = env_u64("DESKPILOT_STEP_TIMEOUT_SECONDS")? {
        builder = builder.with_workflow(|workflow| workflow.step_timeout_seconds = step_timeout);
    }

    if let Some(threshold) = env_f32("DESKPILOT_SIMILARITY_THRESHOLD")? {
        builder = builder.with_retrieval(|retrieval| retrieval.similarity_threshold = threshold);
    }

    if let Some(top_k) = env_usize("DESKPILOT_TOP_K")? {
        builder = builder.with_retrieval(|retrieval| retrieval.top_k = top_k);
    }

    Ok(builder)
}

pub fn env_string(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(anyhow!("{key} contains invalid UTF-8")),
    }
}

pub fn env_u64(key: &str) -> Result<Option<u64>> {
    parse_env(key)
}

pub fn env_u32(key: &str) -> Result<Option<u32>> {
    parse_env(key)
}

pub fn env_f32(key: &str) -> Result<Option<f32>> {
    parse_env(key)
}

pub fn env_usize(key: &str) -> Result<Option<usize>> {
    parse_env(key)
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = env_string(key)? {
        let parsed = value
            .parse::<T>()
            .with_context(|| format!("Failed to parse {key} value '{value}'"))?;
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}
