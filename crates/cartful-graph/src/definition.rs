use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use cartful_core::error::{CartfulError, Result};
use cartful_core::types::ExecutionState;

/// A stage in the workflow graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier.
    pub id: String,
    /// Free-text role, used for logging and diagnostics only.
    pub role: String,
}

impl Node {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// Named pure predicate over execution history guarding an edge.
#[derive(Clone)]
pub struct EdgeGuard {
    name: String,
    predicate: Arc<dyn Fn(&ExecutionState) -> bool + Send + Sync>,
}

impl EdgeGuard {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&ExecutionState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, state: &ExecutionState) -> bool {
        (self.predicate)(state)
    }
}

impl std::fmt::Debug for EdgeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeGuard").field("name", &self.name).finish()
    }
}

/// A directed transition between two nodes.
///
/// Edges from the same source are evaluated in declaration order; the
/// first match wins. An edge without a guard is unconditional and, when
/// the source has several outgoing edges, must be declared last.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub guard: Option<EdgeGuard>,
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            guard: None,
        }
    }

    /// Create a guarded edge.
    pub fn when(from: impl Into<String>, to: impl Into<String>, guard: EdgeGuard) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            guard: Some(guard),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.guard.is_none()
    }
}

/// Immutable workflow graph: nodes, guarded edges, entry/terminal ids,
/// and execution bounds. Built once at process start, validated on
/// construction, safe for concurrent reads.
#[derive(Debug)]
pub struct GraphDefinition {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
    entry: String,
    terminal: String,
    timeout: Duration,
    max_node_executions: u32,
}

impl GraphDefinition {
    /// Build and validate a graph definition.
    ///
    /// Validation failures are configuration errors, fatal at startup:
    /// dangling edge endpoints, missing entry/terminal, a terminal
    /// unreachable from the entry, or an unconditional edge that is not
    /// the last declared for its source.
    pub fn new(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        entry: impl Into<String>,
        terminal: impl Into<String>,
        timeout: Duration,
        max_node_executions: u32,
    ) -> Result<Self> {
        let entry = entry.into();
        let terminal = terminal.into();
        let node_map: HashMap<String, Node> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

        let graph = Self {
            nodes: node_map,
            edges,
            entry,
            terminal,
            timeout,
            max_node_executions,
        };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<()> {
        if self.max_node_executions == 0 {
            return Err(CartfulError::GraphConfig(
                "max_node_executions must be at least 1".into(),
            ));
        }
        if !self.nodes.contains_key(&self.entry) {
            return Err(CartfulError::GraphConfig(format!(
                "entry node '{}' is not in the node set",
                self.entry
            )));
        }
        if !self.nodes.contains_key(&self.terminal) {
            return Err(CartfulError::GraphConfig(format!(
                "terminal node '{}' is not in the node set",
                self.terminal
            )));
        }

        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.from) {
                return Err(CartfulError::GraphConfig(format!(
                    "edge source '{}' is not in the node set",
                    edge.from
                )));
            }
            if !self.nodes.contains_key(&edge.to) {
                return Err(CartfulError::GraphConfig(format!(
                    "edge target '{}' is not in the node set",
                    edge.to
                )));
            }
        }

        // Per source: at most one unconditional edge, declared last.
        for id in self.nodes.keys() {
            let outgoing: Vec<&Edge> = self.outgoing(id).collect();
            let unconditional = outgoing.iter().filter(|e| e.is_unconditional()).count();
            if unconditional > 1 {
                return Err(CartfulError::GraphConfig(format!(
                    "node '{}' has {} unconditional edges, at most one is allowed",
                    id, unconditional
                )));
            }
            if let Some(pos) = outgoing.iter().position(|e| e.is_unconditional()) {
                if pos != outgoing.len() - 1 {
                    return Err(CartfulError::GraphConfig(format!(
                        "unconditional edge out of '{}' must be declared last",
                        id
                    )));
                }
            }
        }

        // Terminal must be reachable from the entry.
        if !self.reachable(&self.entry, &self.terminal) {
            return Err(CartfulError::GraphConfig(format!(
                "terminal node '{}' is unreachable from entry '{}'",
                self.terminal, self.entry
            )));
        }

        Ok(())
    }

    fn reachable(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(from);
        seen.insert(from);
        while let Some(current) = queue.pop_front() {
            for edge in self.outgoing(current) {
                if edge.to == to {
                    return true;
                }
                if seen.insert(&edge.to) {
                    queue.push_back(&edge.to);
                }
            }
        }
        false
    }

    /// Outgoing edges of a node, in declaration order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == node_id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_node_executions(&self) -> u32 {
        self.max_node_executions
    }
}
