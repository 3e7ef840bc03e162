//! Workflow graph execution.
//!
//! A conversational turn is driven through a small, statically defined
//! graph of stages. Each stage is backed by an invocation capability
//! registered in a [`registry::NodeRegistry`]; guarded edges route on
//! keyword classification of stage outputs; the terminal stage's text
//! is recovered and cleaned by [`extract`].

pub mod classify;
pub mod definition;
pub mod executor;
pub mod extract;
pub mod registry;

pub use definition::{Edge, EdgeGuard, GraphDefinition, Node};
pub use executor::GraphExecutor;
pub use extract::extract_final;
pub use registry::NodeRegistry;
