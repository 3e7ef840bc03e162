use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use cartful_core::error::{CartfulError, Result};
use cartful_core::types::{ExecutionState, NodeResult};

use crate::definition::GraphDefinition;
use crate::registry::NodeRegistry;

/// Drives a single run through the workflow graph.
///
/// Holds only immutable, shared structure; all per-run state lives in
/// the `ExecutionState` created inside `run`, so one executor can serve
/// any number of concurrent runs. Each run is strictly sequential: one
/// node invocation at a time, each consuming the previous node's raw
/// output as its prompt.
pub struct GraphExecutor {
    graph: Arc<GraphDefinition>,
    registry: Arc<NodeRegistry>,
}

impl std::fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl GraphExecutor {
    /// Wire a validated graph to its node capabilities.
    ///
    /// Fails if any graph node has no registered capability; like graph
    /// validation this is a startup-time configuration error.
    pub fn new(graph: Arc<GraphDefinition>, registry: Arc<NodeRegistry>) -> Result<Self> {
        for id in graph.node_ids() {
            if !registry.contains(id) {
                return Err(CartfulError::GraphConfig(format!(
                    "no capability registered for node '{}'",
                    id
                )));
            }
        }
        Ok(Self { graph, registry })
    }

    /// Execute the graph from the entry node with the given prompt.
    ///
    /// Returns the full execution state on success. Bound violations
    /// (execution count, wall clock) and dead-end routing return errors
    /// that carry the partial state for diagnostics.
    pub async fn run(&self, initial_prompt: &str) -> Result<ExecutionState> {
        let mut state = ExecutionState::new();
        let deadline = Instant::now() + self.graph.timeout();
        let timeout_secs = self.graph.timeout().as_secs();
        let mut current = self.graph.entry().to_string();
        let mut prompt = initial_prompt.to_string();

        loop {
            if state.executions() >= self.graph.max_node_executions() {
                warn!(
                    node_id = %current,
                    executions = state.executions(),
                    "Execution count bound hit, aborting run"
                );
                return Err(CartfulError::MaxExecutionsExceeded {
                    limit: self.graph.max_node_executions(),
                    state: Box::new(state),
                });
            }

            // The deadline bounds the whole run; each invocation gets
            // whatever budget remains so a slow stage cannot overrun it.
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => {
                    warn!(node_id = %current, "Run deadline reached, aborting run");
                    return Err(CartfulError::RunTimeout {
                        timeout_secs,
                        state: Box::new(state),
                    });
                }
            };

            // Registry coverage is checked in `new`.
            let node = self
                .registry
                .get(&current)
                .ok_or_else(|| {
                    CartfulError::GraphConfig(format!("node '{}' vanished from registry", current))
                })?;

            info!(node_id = %current, role = %node.role, "Executing graph node");

            let invocation = node.invoker.invoke(&prompt);
            let output = match tokio::time::timeout(remaining, invocation).await {
                Err(_) => {
                    warn!(node_id = %current, "Node invocation exceeded run deadline");
                    return Err(CartfulError::RunTimeout {
                        timeout_secs,
                        state: Box::new(state),
                    });
                }
                Ok(Err(e)) => {
                    return Err(CartfulError::NodeInvocation {
                        stage: current,
                        message: e.to_string(),
                    });
                }
                Ok(Ok(output)) => output,
            };

            debug!(
                node_id = %current,
                chars = output.text.len(),
                executions = state.executions() + 1,
                "Node execution complete"
            );

            state.record(NodeResult {
                node_id: current.clone(),
                text: output.text.clone(),
                role: output.role,
                executed_at: chrono::Utc::now(),
            });

            // First matching edge wins; an unguarded edge always matches
            // and validation guarantees it is declared last.
            let next = self
                .graph
                .outgoing(&current)
                .find(|e| e.guard.as_ref().map_or(true, |g| g.matches(&state)))
                .map(|e| {
                    let guard = e.guard.as_ref().map(|g| g.name()).unwrap_or("always");
                    (e.to.clone(), guard.to_string())
                });

            match next {
                Some((to, guard)) => {
                    debug!(from = %current, to = %to, guard = %guard, "Following edge");
                    current = to;
                    prompt = output.text;
                }
                None if current == self.graph.terminal() => {
                    info!(
                        node_id = %current,
                        executions = state.executions(),
                        "Terminal node reached, run complete"
                    );
                    return Ok(state);
                }
                None => {
                    // Non-terminal dead end: the graph lacks a fallback
                    // edge for this output, a configuration defect.
                    warn!(node_id = %current, "No matching edge out of non-terminal node");
                    return Err(CartfulError::NoMatchingEdge {
                        node: current,
                        state: Box::new(state),
                    });
                }
            }
        }
    }
}
