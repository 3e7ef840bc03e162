use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::NodeOutput;

/// A chat-completion backend.
///
/// One system prompt, one user prompt, one response. Providers differ
/// only in wire format; stage behavior comes entirely from the prompts.
pub trait ChatClient: Send + Sync + 'static {
    fn complete(
        &self,
        config: &ModelConfig,
        system: &str,
        prompt: &str,
    ) -> BoxFuture<'_, Result<NodeOutput>>;
}

/// Node invocation capability — a black-box "process a prompt, get text
/// back" operation backing one workflow stage.
///
/// Implementations must treat failures as errors, never as silent empty
/// output. Retry policy, if any, belongs to the implementation; the graph
/// executor never retries.
pub trait NodeInvoker: Send + Sync + 'static {
    /// Send a prompt to the stage and receive its output.
    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<NodeOutput>>;
}

/// Ephemeral cross-turn context store with per-entry expiry.
///
/// Shared mutable state across runs, partitioned by key. Individual
/// operations are atomic; callers own read-then-decide races.
pub trait ContextStore: Send + Sync + 'static {
    /// Store a value under a key, overwriting any existing entry.
    fn put(&self, key: &str, value: &str, ttl_secs: i64) -> BoxFuture<'_, Result<()>>;

    /// Fetch a value. Expired-but-unpurged entries behave as absent.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>>>;

    /// Remove an entry, if present.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<()>>;
}
