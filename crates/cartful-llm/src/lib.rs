pub mod providers;
pub mod retry;
pub mod stage;

use cartful_core::config::ModelConfig;
use cartful_core::traits::ChatClient;

pub use providers::anthropic::AnthropicClient;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;
pub use stage::StageInvoker;

/// Create a chat client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Box<dyn ChatClient> {
    match config.provider.as_str() {
        "anthropic" | "claude" => Box::new(AnthropicClient::new()),
        // Everything else uses the OpenAI-compatible client
        _ => Box::new(OpenAiClient::new()),
    }
}
