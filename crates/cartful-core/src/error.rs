use thiserror::Error;

use crate::types::ExecutionState;

#[derive(Debug, Error)]
pub enum CartfulError {
    // Stage invocation errors
    #[error("stage invocation failed: {stage}: {message}")]
    NodeInvocation { stage: String, message: String },

    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Run bound errors — carry the partial state for diagnostics
    #[error("run exceeded max node executions ({limit})")]
    MaxExecutionsExceeded {
        limit: u32,
        state: Box<ExecutionState>,
    },

    #[error("run exceeded timeout ({timeout_secs}s)")]
    RunTimeout {
        timeout_secs: u64,
        state: Box<ExecutionState>,
    },

    #[error("no matching edge out of non-terminal node '{node}'")]
    NoMatchingEdge {
        node: String,
        state: Box<ExecutionState>,
    },

    // Graph construction errors — fatal at startup, never per-request
    #[error("graph configuration error: {0}")]
    GraphConfig(String),

    // Payload errors
    #[error("invalid payload: {0}")]
    Payload(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CartfulError {
    /// Partial execution state attached to bound/routing errors, if any.
    pub fn partial_state(&self) -> Option<&ExecutionState> {
        match self {
            Self::MaxExecutionsExceeded { state, .. }
            | Self::RunTimeout { state, .. }
            | Self::NoMatchingEdge { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Whether this error is an execution-bound violation.
    pub fn is_bounds_exceeded(&self) -> bool {
        matches!(
            self,
            Self::MaxExecutionsExceeded { .. } | Self::RunTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CartfulError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_errors_carry_state() {
        let err = CartfulError::MaxExecutionsExceeded {
            limit: 8,
            state: Box::new(ExecutionState::new()),
        };
        assert!(err.is_bounds_exceeded());
        assert!(err.partial_state().is_some());

        let err = CartfulError::Config("bad".into());
        assert!(!err.is_bounds_exceeded());
        assert!(err.partial_state().is_none());
    }

    #[test]
    fn test_no_matching_edge_is_not_bounds() {
        let err = CartfulError::NoMatchingEdge {
            node: "router".into(),
            state: Box::new(ExecutionState::new()),
        };
        assert!(!err.is_bounds_exceeded());
        assert!(err.partial_state().is_some());
    }
}
