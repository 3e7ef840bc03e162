use std::sync::Arc;

use tracing::{error, info, warn};

use cartful_core::config::AppConfig;
use cartful_core::error::{CartfulError, Result};
use cartful_core::traits::ContextStore;
use cartful_core::types::ExecutionState;
use cartful_graph::classify::{normalize, order_confirmed};
use cartful_graph::definition::GraphDefinition;
use cartful_graph::executor::GraphExecutor;
use cartful_graph::extract::extract_final;
use cartful_graph::registry::NodeRegistry;
use cartful_session::key::current_key;

use crate::payload::{ActionTag, InvocationPayload};
use crate::stages::{ORDER, ROUTER};

const GREETINGS: [&str; 4] = ["hello", "hi", "hey", "hiya"];

const WELCOME: &str = "Hi! I'm your grocery assistant. I can help you:\n\
    1. Browse products - just tell me what you're looking for\n\
    2. Order from a photo - send a picture of your grocery list\n\
    3. Check on an order - ask about your delivery\n\
    What can I get you today?";

/// Machine-readable classification of a failed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnError {
    /// A stage capability failed or returned malformed content.
    NodeInvocation,
    /// Execution-count or wall-clock bound hit.
    BoundsExceeded,
    /// The terminal stage never produced usable text.
    Extraction,
}

/// What goes back to the customer: always usable text, plus the error
/// classification when the text is a fallback.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
    pub error: Option<TurnError>,
}

impl TurnReply {
    fn ok(text: String) -> Self {
        Self { text, error: None }
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Handles one conversational turn end to end: session correlation,
/// carried context, graph run, extraction and fallback mapping.
pub struct OrderAssistant {
    graph: Arc<GraphDefinition>,
    executor: GraphExecutor,
    context: Arc<dyn ContextStore>,
    window_secs: i64,
    context_ttl_secs: i64,
    fallback_message: String,
}

impl OrderAssistant {
    pub fn new(
        config: &AppConfig,
        graph: Arc<GraphDefinition>,
        registry: Arc<NodeRegistry>,
        context: Arc<dyn ContextStore>,
    ) -> Result<Self> {
        let executor = GraphExecutor::new(graph.clone(), registry)?;
        Ok(Self {
            graph,
            executor,
            context,
            window_secs: config.session.window_secs,
            context_ttl_secs: config.session.context_ttl_secs,
            fallback_message: config.assistant.fallback_message.clone(),
        })
    }

    /// Process one inbound turn. Never fails toward the caller; every
    /// error path yields the configured fallback text plus its
    /// classification.
    pub async fn handle_turn(&self, payload: &InvocationPayload) -> TurnReply {
        let session_key = current_key(&payload.customer_id, self.window_secs);

        if let Some(greeting) = self.greeting_reply(payload) {
            info!(customer_id = %payload.customer_id, "Greeting short-circuit");
            return greeting;
        }

        // A store hiccup must not kill the turn; run without context.
        let carried = match self.context.get(&session_key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Context read failed, continuing without");
                None
            }
        };

        let prompt = payload.build_initial_prompt(carried.as_deref());

        match self.executor.run(&prompt).await {
            Ok(state) => match extract_final(&state, self.graph.terminal()) {
                Some(text) if !text.is_empty() => {
                    info!(
                        customer_id = %payload.customer_id,
                        executions = state.executions(),
                        "Turn complete"
                    );
                    self.update_context(&session_key, &text, &state).await;
                    TurnReply::ok(text)
                }
                _ => {
                    error!(
                        customer_id = %payload.customer_id,
                        "Terminal stage produced no usable text"
                    );
                    self.fallback(TurnError::Extraction)
                }
            },
            Err(e) => {
                let kind = classify_error(&e);
                if let Some(partial) = e.partial_state() {
                    error!(
                        customer_id = %payload.customer_id,
                        error = %e,
                        executions = partial.executions(),
                        "Run aborted with partial state"
                    );
                } else {
                    error!(customer_id = %payload.customer_id, error = %e, "Run failed");
                }
                self.fallback(kind)
            }
        }
    }

    /// After a confirmed order the session context is spent; otherwise
    /// the reply (typically presented options) is carried to the next
    /// turn in the same window.
    async fn update_context(&self, session_key: &str, reply: &str, state: &ExecutionState) {
        let result = if order_confirmed(ROUTER, ORDER).matches(state) {
            self.context.delete(session_key).await
        } else {
            self.context
                .put(session_key, reply, self.context_ttl_secs)
                .await
        };
        if let Err(e) = result {
            warn!(error = %e, "Context update failed");
        }
    }

    fn greeting_reply(&self, payload: &InvocationPayload) -> Option<TurnReply> {
        if payload.action != ActionTag::TextMessage {
            return None;
        }
        let message = payload.message.as_deref()?;
        let normalized = normalize(message);
        // A turn that opens with a greeting word gets the menu even if
        // more text follows ("hello, I need milk"). Matching the whole
        // leading word keeps "history" from reading as "hi".
        let word = normalized
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| c.is_ascii_punctuation());
        if GREETINGS.contains(&word) {
            Some(TurnReply::ok(WELCOME.to_string()))
        } else {
            None
        }
    }

    fn fallback(&self, kind: TurnError) -> TurnReply {
        TurnReply {
            text: self.fallback_message.clone(),
            error: Some(kind),
        }
    }
}

fn classify_error(e: &CartfulError) -> TurnError {
    if e.is_bounds_exceeded() {
        TurnError::BoundsExceeded
    } else {
        TurnError::NodeInvocation
    }
}
