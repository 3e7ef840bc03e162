use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use cartful_core::config::ModelConfig;
use cartful_core::error::Result;
use cartful_core::traits::{ChatClient, NodeInvoker};
use cartful_core::types::NodeOutput;

/// Binds a chat client, a model configuration and a stage system prompt
/// into a node invocation capability.
///
/// All stages share one client; they differ only in system prompt.
pub struct StageInvoker {
    stage: String,
    system_prompt: String,
    model: ModelConfig,
    client: Arc<dyn ChatClient>,
}

impl StageInvoker {
    pub fn new(
        stage: impl Into<String>,
        system_prompt: impl Into<String>,
        model: ModelConfig,
        client: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            stage: stage.into(),
            system_prompt: system_prompt.into(),
            model,
            client,
        }
    }
}

impl NodeInvoker for StageInvoker {
    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<NodeOutput>> {
        let prompt = prompt.to_string();
        Box::pin(async move {
            debug!(stage = %self.stage, chars = prompt.len(), "Invoking stage");
            self.client
                .complete(&self.model, &self.system_prompt, &prompt)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingClient {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl ChatClient for CapturingClient {
        fn complete(
            &self,
            _config: &ModelConfig,
            system: &str,
            prompt: &str,
        ) -> BoxFuture<'_, Result<NodeOutput>> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Box::pin(async move { Ok(NodeOutput::text("reply")) })
        }
    }

    #[tokio::test]
    async fn test_stage_binds_system_prompt() {
        let client = Arc::new(CapturingClient {
            seen: Mutex::new(Vec::new()),
        });
        let model = ModelConfig {
            provider: "anthropic".to_string(),
            model_id: "m".to_string(),
            api_key: Some("k".to_string()),
            base_url: None,
            max_tokens: 100,
            temperature: 0.1,
            retry: None,
        };

        let invoker = StageInvoker::new("router", "You triage turns.", model, client.clone());
        let out = invoker.invoke("customer message").await.unwrap();
        assert_eq!(out.text, "reply");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "You triage turns.");
        assert_eq!(seen[0].1, "customer message");
    }
}
