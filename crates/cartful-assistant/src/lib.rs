//! Grocery ordering assistant built on the workflow graph.

pub mod assistant;
pub mod payload;
pub mod stages;

pub use assistant::{OrderAssistant, TurnError, TurnReply};
pub use payload::{ActionTag, InvocationPayload, MediaRef};
pub use stages::{build_registry, default_graph};
