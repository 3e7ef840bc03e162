use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CartfulError, Result};

/// Top-level Cartful configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_provider() -> String { "anthropic".to_string() }
fn default_max_tokens() -> u32 { 4000 }
fn default_temperature() -> f32 { 0.1 }

/// Retry configuration for stage invocations (lives in the capability
/// layer; the graph executor itself never retries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Execution bounds for a single graph run. Static configuration, never
/// negotiated per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Wall-clock budget for one run in seconds.
    #[serde(default = "default_run_timeout")]
    pub timeout_secs: u64,
    /// Hard cap on total node executions per run, independent of time.
    #[serde(default = "default_max_node_executions")]
    pub max_node_executions: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_run_timeout(),
            max_node_executions: default_max_node_executions(),
        }
    }
}

fn default_run_timeout() -> u64 { 120 }
fn default_max_node_executions() -> u32 { 12 }

/// Session correlation and cross-turn context settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tumbling window size for session key derivation, in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    /// TTL for ephemeral context entries, in seconds.
    #[serde(default = "default_context_ttl")]
    pub context_ttl_secs: i64,
    /// Path to the context database (~ is expanded).
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            context_ttl_secs: default_context_ttl(),
            db_path: default_db_path(),
        }
    }
}

fn default_window_secs() -> i64 { 600 }
fn default_context_ttl() -> i64 { 1800 }
fn default_db_path() -> String { "~/.cartful/context.db".to_string() }

/// Caller-facing behavior of the turn handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// User-safe message substituted on any failure path.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_fallback_message() -> String {
    "Sorry, there was an error processing your message. Please try again.".to_string()
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| CartfulError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| CartfulError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject non-positive bounds up front; a zero session window would
    /// otherwise divide by zero on the first turn.
    pub fn validate(&self) -> Result<()> {
        if self.graph.timeout_secs < 1 {
            return Err(CartfulError::Config(
                "graph.timeout_secs must be at least 1".into(),
            ));
        }
        if self.session.window_secs < 1 {
            return Err(CartfulError::Config(
                "session.window_secs must be at least 1".into(),
            ));
        }
        if self.session.context_ttl_secs < 1 {
            return Err(CartfulError::Config(
                "session.context_ttl_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the context database path (expand ~).
    pub fn context_db_path(&self) -> PathBuf {
        let raw = &self.session.db_path;
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(raw)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_CARTFUL_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_CARTFUL_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_CARTFUL_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_CARTFUL_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_CARTFUL_VAR}\"");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let toml_str = r#"
[model]
model_id = "claude-sonnet-4-20250514"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.provider, "anthropic");
        assert_eq!(config.model.max_tokens, 4000);
        assert_eq!(config.graph.timeout_secs, 120);
        assert_eq!(config.graph.max_node_executions, 12);
        assert_eq!(config.session.window_secs, 600);
        assert_eq!(config.session.context_ttl_secs, 1800);
        assert!(config.fallback_models.is_empty());
        assert!(config
            .assistant
            .fallback_message
            .contains("error processing your message"));
    }

    #[test]
    fn test_rejects_non_positive_bounds() {
        let zero_window: AppConfig = toml::from_str(
            r#"
[model]
model_id = "m"

[session]
window_secs = 0
"#,
        )
        .unwrap();
        let err = zero_window.validate().unwrap_err();
        assert!(err.to_string().contains("window_secs"));

        let zero_ttl: AppConfig = toml::from_str(
            r#"
[model]
model_id = "m"

[session]
context_ttl_secs = 0
"#,
        )
        .unwrap();
        assert!(zero_ttl.validate().is_err());

        let zero_timeout: AppConfig = toml::from_str(
            r#"
[model]
model_id = "m"

[graph]
timeout_secs = 0
"#,
        )
        .unwrap();
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_full_config() {
        let toml_str = r#"
[model]
provider = "openai"
model_id = "gpt-4o"
api_key = "sk-test"
base_url = "http://localhost:11434/v1"
temperature = 0.2

[[fallback_models]]
model_id = "claude-haiku-3-5"

[graph]
timeout_secs = 60
max_node_executions = 8

[session]
window_secs = 300
context_ttl_secs = 900
db_path = "/tmp/cartful-test.db"

[assistant]
fallback_message = "Try again later."
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.fallback_models.len(), 1);
        assert_eq!(config.graph.max_node_executions, 8);
        assert_eq!(config.session.window_secs, 300);
        assert_eq!(config.assistant.fallback_message, "Try again later.");
        assert_eq!(
            config.context_db_path(),
            PathBuf::from("/tmp/cartful-test.db")
        );
    }
}
