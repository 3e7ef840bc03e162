use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use cartful_core::config::ModelConfig;
use cartful_core::error::{CartfulError, Result};
use cartful_core::traits::ChatClient;
use cartful_core::types::{ContentPart, NodeOutput};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq,
/// OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient for OpenAiClient {
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
                .ok_or_else(|| CartfulError::Config("API key not set".into()))?;

            let base_url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);

            let mut messages = Vec::new();
            if !system.is_empty() {
                messages.push(OaiMessage {
                    role: "system".to_string(),
                    content: system,
                });
            }
            messages.push(OaiMessage {
                role: "user".to_string(),
                content: prompt,
            });

            let body = ChatRequest {
                model: config.model_id.clone(),
                messages,
                max_tokens: config.max_tokens,
                temperature: if config.temperature > 0.0 {
                    Some(config.temperature)
                } else {
                    None
                },
            };

            let response = self
                .http
                .post(base_url)
                .header("authorization", format!("Bearer {}", api_key))
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

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| CartfulError::LlmParse(e.to_string()))?;

            let choice = parsed
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| CartfulError::LlmParse("response had no choices".into()))?;

            let text = choice.message.content.unwrap_or_default();
            Ok(NodeOutput {
                parts: vec![ContentPart::Text { text: text.clone() }],
                text,
                role: Some(choice.message.role),
            })
        })
    }
}
