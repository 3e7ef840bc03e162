use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cartful_core::config::ModelConfig;
use cartful_core::error::{CartfulError, Result};
use cartful_core::traits::ChatClient;
use cartful_core::types::{ContentPart, NodeOutput};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: Client,
}

impl AnthropicClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

// Anthropic Messages API request types
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

// Response types
#[derive(Deserialize)]
struct AnthropicResponse {
    role: String,
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    Thinking { thinking: String },
}

#[derive(Deserialize)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn into_output(response: AnthropicResponse) -> NodeOutput {
    let mut text = String::new();
    let mut parts = Vec::new();

    for block in response.content {
        match block {
            ResponseBlock::Text { text: t } => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&t);
                parts.push(ContentPart::Text { text: t });
            }
            ResponseBlock::Thinking { thinking } => {
                parts.push(ContentPart::Thinking { thinking });
            }
        }
    }

    NodeOutput {
        text,
        role: Some(response.role),
        parts,
    }
}

impl ChatClient for AnthropicClient {
    fn complete(
        &self,
        config: &ModelConfig,
        system: &str,
        prompt: &str,
    ) -> BoxFuture<'_, Result<NodeOutput>> {
        let config = config.clone();
        let system = system.to_string();
        let prompt = prompt.to_string();

        Box::pin(async move {
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| CartfulError::Config("Anthropic API key not set".into()))?;

            let base_url = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);

            let body = AnthropicRequest {
                model: config.model_id.clone(),
                max_tokens: config.max_tokens,
                temperature: if config.temperature > 0.0 {
                    Some(config.temperature)
                } else {
                    None
                },
                messages: vec![ApiMessage {
                    role: "user".to_string(),
                    content: prompt,
                }],
                system: if system.is_empty() {
                    None
                } else {
                    Some(system)
                },
            };

            let response = self
                .http
                .post(base_url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| CartfulError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(CartfulError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let parsed: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| CartfulError::LlmParse(e.to_string()))?;

            if let Some(usage) = &parsed.usage {
                debug!(
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Token usage"
                );
            }

            Ok(into_output(parsed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_output_joins_text_and_keeps_thinking_apart() {
        let response = AnthropicResponse {
            role: "assistant".to_string(),
            content: vec![
                ResponseBlock::Thinking {
                    thinking: "scratch".to_string(),
                },
                ResponseBlock::Text {
                    text: "Hello".to_string(),
                },
                ResponseBlock::Text {
                    text: "World".to_string(),
                },
            ],
            usage: None,
        };

        let output = into_output(response);
        assert_eq!(output.text, "Hello\nWorld");
        assert_eq!(output.role.as_deref(), Some("assistant"));
        assert_eq!(output.parts.len(), 3);
    }
}
