use std::io::Write;

use cartful_core::config::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "anthropic"
model_id = "claude-sonnet-4-20250514"
api_key = "sk-test-key"
max_tokens = 2048
temperature = 0.3

[model.retry]
max_retries = 5
initial_backoff_ms = 250

[[fallback_models]]
provider = "openai"
model_id = "gpt-4o"
api_key = "sk-other"

[graph]
timeout_secs = 90
max_node_executions = 10

[session]
window_secs = 300
context_ttl_secs = 900
db_path = "/tmp/cartful-test/context.db"

[assistant]
fallback_message = "Something went wrong, please retry."
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "anthropic");
    assert_eq!(config.model.model_id, "claude-sonnet-4-20250514");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 2048);

    let retry = config.model.retry.expect("retry present");
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.initial_backoff_ms, 250);
    assert_eq!(retry.max_backoff_ms, 30000);

    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "openai");

    assert_eq!(config.graph.timeout_secs, 90);
    assert_eq!(config.graph.max_node_executions, 10);
    assert_eq!(config.session.window_secs, 300);
    assert_eq!(config.session.context_ttl_secs, 900);
    assert_eq!(
        config.assistant.fallback_message,
        "Something went wrong, please retry."
    );
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("CARTFUL_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
model_id = "test-model"
api_key = "${CARTFUL_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("CARTFUL_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "llama3.2"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "anthropic");
    assert_eq!(config.model.max_tokens, 4000);
    assert!(config.model.retry.is_none());
    assert!(config.fallback_models.is_empty());
    assert_eq!(config.graph.timeout_secs, 120);
    assert_eq!(config.graph.max_node_executions, 12);
    assert_eq!(config.session.window_secs, 600);
    assert_eq!(config.session.context_ttl_secs, 1800);
}

#[test]
fn test_zero_session_window_rejected_at_load() {
    let toml_content = r#"
[model]
model_id = "claude-sonnet-4-20250514"

[session]
window_secs = 0
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("window_secs"));
}

#[test]
fn test_missing_config_file_is_reported() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/cartful.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/cartful.toml"));
}

#[test]
fn test_default_graph_builds_from_minimal_config() {
    let toml_content = r#"
[model]
model_id = "claude-sonnet-4-20250514"
api_key = "test"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    let graph = cartful_assistant::default_graph(&config).expect("valid default graph");

    assert_eq!(graph.entry(), graph.terminal());
    assert_eq!(graph.max_node_executions(), 12);
}
