use std::io::Write;

use tempfile::NamedTempFile;

use super::builder::ConfigBuilder;
use super::constants::*;
use super::types::Config;
use super::validation::validate;

#[test]
fn defaults_match_documented_values() {
    let config = ConfigBuilder::new().build().unwrap();

    assert_eq!(config.workflow.max_retries, DEFAULT_MAX_RETRIES);
    assert_eq!(
        config.workflow.step_timeout_seconds,
        DEFAULT_STEP_TIMEOUT_SECONDS
    );
    assert_eq!(
        config.retrieval.similarity_threshold,
        DEFAULT_SIMILARITY_THRESHOLD
    );
    assert_eq!(config.retrieval.top_k, DEFAULT_TOP_K);
    assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.llm.timeout_secs, DEFAULT_TIMEOUT_SECS);
}

#[test]
fn builder_closures_override_settings() {
    let config = ConfigBuilder::new()
        .with_llm(|llm| llm.api_key = "secret".to_string())
        .with_workflow(|workflow| workflow.max_retries = 4)
        .with_retrieval(|retrieval| retrieval.top_k = 3)
        .build()
        .unwrap();

    assert_eq!(config.llm.api_key, "secret");
    assert_eq!(config.workflow.max_retries, 4);
    assert_eq!(config.retrieval.top_k, 3);
}

#[test]
fn file_settings_layer_over_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "llm": {{"api_key": "from-file", "chat_model": "gpt-4o"}},
            "workflow": {{"max_retries": 3}},
            "retrieval": {{"similarity_threshold": 0.8}}
        }}"#
    )
    .unwrap();

    let builder = Config::apply_file(ConfigBuilder::new(), file.path()).unwrap();
    let config = builder.build().unwrap();

    assert_eq!(config.llm.api_key, "from-file");
    assert_eq!(config.llm.chat_model, "gpt-4o");
    assert_eq!(config.llm.embedding_model, DEFAULT_EMBEDDING_MODEL);
    assert_eq!(config.workflow.max_retries, 3);
    assert_eq!(config.workflow.step_timeout_seconds, DEFAULT_STEP_TIMEOUT_SECONDS);
    assert!((config.retrieval.similarity_threshold - 0.8).abs() < f32::EPSILON);
}

#[test]
fn malformed_file_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();

    let err = Config::apply_file(ConfigBuilder::new(), file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn validation_requires_api_key() {
    let config = ConfigBuilder::new().build().unwrap();
    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("API key"));
}

#[test]
fn validation_rejects_out_of_range_threshold() {
    let config = ConfigBuilder::new()
        .with_llm(|llm| llm.api_key = "secret".to_string())
        .with_retrieval(|retrieval| retrieval.similarity_threshold = 1.5)
        .build()
        .unwrap();

    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("similarity_threshold"));
}

#[test]
fn validation_rejects_zero_attempt_budget() {
    let config = ConfigBuilder::new()
        .with_llm(|llm| llm.api_key = "secret".to_string())
        .with_workflow(|workflow| workflow.max_retries = 0)
        .build()
        .unwrap();

    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("max_retries"));
}
