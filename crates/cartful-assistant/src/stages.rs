//! The default grocery workflow: stage definitions, wiring and prompts.

use std::sync::Arc;
use std::time::Duration;

use cartful_core::config::AppConfig;
use cartful_core::error::Result;
use cartful_core::traits::ChatClient;
use cartful_graph::classify::{order_ready, wants_image_processing};
use cartful_graph::definition::{Edge, GraphDefinition, Node};
use cartful_graph::registry::NodeRegistry;
use cartful_llm::{create_client, RetryingClient, StageInvoker};

pub const ROUTER: &str = "router";
pub const IMAGE: &str = "image";
pub const CATALOG: &str = "catalog";
pub const ORDER: &str = "order";
pub const WAREHOUSE: &str = "warehouse";

const ROUTER_PROMPT: &str = include_str!("../prompts/router.md");
const IMAGE_PROMPT: &str = include_str!("../prompts/image.md");
const CATALOG_PROMPT: &str = include_str!("../prompts/catalog.md");
const ORDER_PROMPT: &str = include_str!("../prompts/order.md");
const WAREHOUSE_PROMPT: &str = include_str!("../prompts/warehouse.md");

/// Build the default workflow graph.
///
/// The router is both entry and terminal: a turn ends whenever the
/// router's latest output matches no routing marker. The two cycles
/// back to the router let it summarize specialist results for the
/// customer before the run stops.
pub fn default_graph(config: &AppConfig) -> Result<GraphDefinition> {
    GraphDefinition::new(
        vec![
            Node::new(ROUTER, "intent triage and customer voice"),
            Node::new(IMAGE, "grocery list extraction"),
            Node::new(CATALOG, "catalog search"),
            Node::new(ORDER, "order placement"),
            Node::new(WAREHOUSE, "delivery scheduling"),
        ],
        vec![
            Edge::when(ROUTER, IMAGE, wants_image_processing(ROUTER)),
            Edge::when(ROUTER, ORDER, order_ready(ROUTER)),
            Edge::always(IMAGE, CATALOG),
            Edge::always(CATALOG, ROUTER),
            Edge::always(ORDER, WAREHOUSE),
            Edge::always(WAREHOUSE, ROUTER),
        ],
        ROUTER,
        ROUTER,
        Duration::from_secs(config.graph.timeout_secs),
        config.graph.max_node_executions,
    )
}

/// Wire every stage to a shared retrying chat client.
pub fn build_registry(config: &AppConfig) -> NodeRegistry {
    let primary = create_client(&config.model);
    let fallbacks = config
        .fallback_models
        .iter()
        .map(|m| (m.clone(), create_client(m)))
        .collect();
    let retry = config.model.retry.clone().unwrap_or_default();

    let client: Arc<dyn ChatClient> = Arc::new(RetryingClient::new(primary, fallbacks, retry));

    let mut registry = NodeRegistry::new();
    for (id, role, prompt) in [
        (ROUTER, "intent triage and customer voice", ROUTER_PROMPT),
        (IMAGE, "grocery list extraction", IMAGE_PROMPT),
        (CATALOG, "catalog search", CATALOG_PROMPT),
        (ORDER, "order placement", ORDER_PROMPT),
        (WAREHOUSE, "delivery scheduling", WAREHOUSE_PROMPT),
    ] {
        registry.register(
            id,
            role,
            Arc::new(StageInvoker::new(
                id,
                prompt,
                config.model.clone(),
                client.clone(),
            )),
        );
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        let toml_str = r#"
[model]
model_id = "claude-sonnet-4-20250514"
api_key = "test"
"#;
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_default_graph_validates() {
        let graph = default_graph(&test_config()).unwrap();
        assert_eq!(graph.entry(), ROUTER);
        assert_eq!(graph.terminal(), ROUTER);
        assert_eq!(graph.outgoing(ROUTER).count(), 2);
        // Every specialist flows back toward the router.
        assert_eq!(graph.outgoing(IMAGE).count(), 1);
        assert_eq!(graph.outgoing(WAREHOUSE).count(), 1);
    }

    #[test]
    fn test_registry_covers_all_graph_nodes() {
        let config = test_config();
        let graph = default_graph(&config).unwrap();
        let registry = build_registry(&config);
        for id in graph.node_ids() {
            assert!(registry.contains(id), "no capability for {id}");
        }
    }
}
