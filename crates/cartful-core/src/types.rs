use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single content part in a stage response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "thinking")]
    Thinking { thinking: String },
}

/// Output of one stage invocation: the textual body plus whatever
/// structured parts the backing capability supplied.
#[derive(Debug, Clone, Default)]
pub struct NodeOutput {
    pub text: String,
    /// Role/type tag reported by the capability (e.g. "assistant").
    pub role: Option<String>,
    pub parts: Vec<ContentPart>,
}

impl NodeOutput {
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            parts: vec![ContentPart::Text { text: text.clone() }],
            text,
            role: None,
        }
    }
}

/// Record of one node execution within a run.
#[derive(Debug, Clone)]
pub struct NodeResult {
    /// Which node was executed.
    pub node_id: String,
    /// Raw output text, exactly as the capability returned it.
    pub text: String,
    /// Role tag from the capability, when available.
    pub role: Option<String>,
    /// When the execution finished.
    pub executed_at: DateTime<Utc>,
}

impl NodeResult {
    pub fn new(node_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            text: text.into(),
            role: None,
            executed_at: Utc::now(),
        }
    }
}

/// Mutable state scoped to a single graph run.
///
/// Results are kept in execution order; a node that executes more than
/// once appears more than once, and `latest` returns the most recent
/// entry for that node.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    results: Vec<NodeResult>,
    executions: u32,
    started: Instant,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            executions: 0,
            started: Instant::now(),
        }
    }

    /// Record a node execution.
    pub fn record(&mut self, result: NodeResult) {
        self.results.push(result);
        self.executions += 1;
    }

    /// Most recent result for a given node id.
    pub fn latest(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.iter().rev().find(|r| r.node_id == node_id)
    }

    /// The last result recorded, regardless of node.
    pub fn last(&self) -> Option<&NodeResult> {
        self.results.last()
    }

    /// All results in execution order.
    pub fn results(&self) -> &[NodeResult] {
        &self.results
    }

    /// Total node executions so far.
    pub fn executions(&self) -> u32 {
        self.executions
    }

    /// Wall-clock time elapsed since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}
