use std::collections::HashMap;
use std::sync::Arc;

use cartful_core::traits::NodeInvoker;

/// A node's invocation capability plus its declared role.
#[derive(Clone)]
pub struct RegisteredNode {
    pub role: String,
    pub invoker: Arc<dyn NodeInvoker>,
}

/// Maps node identifiers to their invocation capabilities.
///
/// Built once at process start with all capabilities wired in, then
/// shared read-only across concurrent runs.
#[derive(Default)]
pub struct NodeRegistry {
    entries: HashMap<String, RegisteredNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a capability for a node id, replacing any existing one.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        role: impl Into<String>,
        invoker: Arc<dyn NodeInvoker>,
    ) {
        self.entries.insert(
            id.into(),
            RegisteredNode {
                role: role.into(),
                invoker,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredNode> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
