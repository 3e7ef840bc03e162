use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use cartful_core::config::{ModelConfig, RetryConfig};
use cartful_core::error::{CartfulError, Result};
use cartful_core::traits::ChatClient;
use cartful_core::types::NodeOutput;

/// A chat client that retries failed requests and falls back to
/// alternative providers.
pub struct RetryingClient {
    primary: Box<dyn ChatClient>,
    fallbacks: Vec<(ModelConfig, Box<dyn ChatClient>)>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Box<dyn ChatClient>,
        fallbacks: Vec<(ModelConfig, Box<dyn ChatClient>)>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry_config,
        }
    }
}

fn is_retryable(e: &CartfulError) -> bool {
    match e {
        CartfulError::LlmRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = (config.initial_backoff_ms * 2u64.pow(attempt)).min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl ChatClient for RetryingClient {
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
            let max_retries = self.retry_config.max_retries;

            // Try primary with retries
            let mut last_err = None;
            for attempt in 0..=max_retries {
                match self.primary.complete(&config, &system, &prompt).await {
                    Ok(output) => return Ok(output),
                    Err(e) => {
                        if is_retryable(&e) && attempt < max_retries {
                            let backoff = calculate_backoff(attempt, &self.retry_config);
                            warn!(
                                attempt = attempt + 1,
                                max_retries,
                                backoff_ms = backoff.as_millis() as u64,
                                error = %e,
                                "Retrying LLM request"
                            );
                            tokio::time::sleep(backoff).await;
                            last_err = Some(e);
                            continue;
                        }
                        last_err = Some(e);
                        break;
                    }
                }
            }

            // Primary exhausted, try fallbacks
            if !self.fallbacks.is_empty() {
                info!("Primary LLM exhausted, trying fallback models");
            }
            for (fb_config, fb_client) in &self.fallbacks {
                match fb_client.complete(fb_config, &system, &prompt).await {
                    Ok(output) => {
                        info!(
                            model = %fb_config.model_id,
                            provider = %fb_config.provider,
                            "Fell back to alternative model"
                        );
                        return Ok(output);
                    }
                    Err(e) => {
                        warn!(
                            model = %fb_config.model_id,
                            error = %e,
                            "Fallback model also failed"
                        );
                        continue;
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| CartfulError::LlmRequest("All providers failed".into())))
        })
    }
}
