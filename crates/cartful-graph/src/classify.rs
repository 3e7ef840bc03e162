//! Keyword classification of stage outputs.
//!
//! Routing decisions are pure string predicates over the latest output
//! of a given node, applied to normalized text. The phrase sets are
//! load-bearing: the stage prompts instruct the model to emit these
//! exact markers, so changing a phrase here requires changing the
//! corresponding prompt.

use cartful_core::types::ExecutionState;

use crate::definition::EdgeGuard;

/// Emitted by the triage stage when the turn carries an image to process.
pub const IMAGE_ROUTE_MARKER: &str = "route_to_image";

/// Both must be present before the order stage takes over.
pub const ORDER_ITEMS_MARKER: &str = "items to order:";
pub const ORDER_TOTAL_MARKER: &str = "total amount:";

/// Confirmation wording from the triage stage after a completed order.
pub const CONFIRMED_MARKER: &str = "order confirmed";
pub const DELIVERY_MARKER: &str = "delivery";
/// Rejection wording that disqualifies a confirmation match.
pub const ORDER_FAILED_MARKER: &str = "unable to place";

/// Lower-case and collapse whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn latest_normalized(state: &ExecutionState, node_id: &str) -> Option<String> {
    state.latest(node_id).map(|r| normalize(&r.text))
}

/// The node asked for image processing.
///
/// Deliberately does not exclude the order markers: if an output ever
/// carried both, image routing wins. The reverse exclusion in
/// [`order_ready`] is one-directional on purpose.
pub fn wants_image_processing(node_id: &str) -> EdgeGuard {
    let node_id = node_id.to_string();
    EdgeGuard::new("wants_image_processing", move |state| {
        latest_normalized(state, &node_id)
            .map(|text| text.contains(IMAGE_ROUTE_MARKER))
            .unwrap_or(false)
    })
}

/// The node produced a complete order block ready for placement.
///
/// Requires both order markers and the absence of the image-route
/// marker, so an output that routes to image processing never also
/// starts an order.
pub fn order_ready(node_id: &str) -> EdgeGuard {
    let node_id = node_id.to_string();
    EdgeGuard::new("order_ready", move |state| {
        latest_normalized(state, &node_id)
            .map(|text| {
                text.contains(ORDER_ITEMS_MARKER)
                    && text.contains(ORDER_TOTAL_MARKER)
                    && !text.contains(IMAGE_ROUTE_MARKER)
            })
            .unwrap_or(false)
    })
}

/// The node's latest output confirms a placed order with a delivery
/// slot, the wording does not signal a placement failure, and the order
/// stage actually ran earlier in this run.
pub fn order_confirmed(node_id: &str, order_node_id: &str) -> EdgeGuard {
    let node_id = node_id.to_string();
    let order_node_id = order_node_id.to_string();
    EdgeGuard::new("order_confirmed", move |state| {
        let Some(text) = latest_normalized(state, &node_id) else {
            return false;
        };
        state.latest(&order_node_id).is_some()
            && text.contains(CONFIRMED_MARKER)
            && text.contains(DELIVERY_MARKER)
            && !text.contains(ORDER_FAILED_MARKER)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartful_core::types::NodeResult;

    fn state_with(node_id: &str, text: &str) -> ExecutionState {
        let mut state = ExecutionState::new();
        state.record(NodeResult::new(node_id, text));
        state
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize("  Items   to\tOrder:\n milk "),
            "items to order: milk"
        );
    }

    #[test]
    fn test_image_marker_matches() {
        let guard = wants_image_processing("router");
        assert!(guard.matches(&state_with("router", "please ROUTE_TO_IMAGE now")));
        assert!(!guard.matches(&state_with("router", "here is your catalog")));
        assert!(!guard.matches(&state_with("other", "route_to_image")));
        assert!(!guard.matches(&ExecutionState::new()));
    }

    #[test]
    fn test_order_requires_both_markers() {
        let guard = order_ready("router");
        let full = "Selected Option: 2\nItems to Order: milk, bread\nTotal Amount: 10\nCustomer Id: 555";
        assert!(guard.matches(&state_with("router", full)));
        assert!(!guard.matches(&state_with("router", "Items to Order: milk, bread")));
        assert!(!guard.matches(&state_with("router", "Total Amount: 10")));
    }

    /// Order classification excludes the image marker; image
    /// classification does not exclude the order markers. The exclusion
    /// is one-directional and both tests pin it.
    #[test]
    fn test_marker_overlap_is_one_directional() {
        let both = "route_to_image\nItems to Order: milk\nTotal Amount: 10";
        assert!(wants_image_processing("router").matches(&state_with("router", both)));
        assert!(!order_ready("router").matches(&state_with("router", both)));
    }

    #[test]
    fn test_confirmation_needs_order_history() {
        let guard = order_confirmed("router", "order");
        let text = "Order confirmed! Delivery scheduled for tomorrow 9-11am.";

        // Confirmation wording alone is not enough.
        assert!(!guard.matches(&state_with("router", text)));

        let mut state = ExecutionState::new();
        state.record(NodeResult::new("order", "Order #88 placed"));
        state.record(NodeResult::new("router", text));
        assert!(guard.matches(&state));
    }

    #[test]
    fn test_confirmation_disqualified_by_failure_wording() {
        let guard = order_confirmed("router", "order");
        let mut state = ExecutionState::new();
        state.record(NodeResult::new("order", "placement attempt"));
        state.record(NodeResult::new(
            "router",
            "We were unable to place your order confirmed items for delivery.",
        ));
        assert!(!guard.matches(&state));
    }

    #[test]
    fn test_guards_mutually_exclusive_on_stage_outputs() {
        // Outputs the triage prompt can actually produce must match at
        // most one routing guard apiece.
        let image = wants_image_processing("router");
        let order = order_ready("router");

        let outputs = [
            "route_to_image",
            "Items to Order: eggs\nTotal Amount: 5",
            "Here are some options from the catalog:\n1. Eggs $5",
        ];
        for text in outputs {
            let state = state_with("router", text);
            let hits = [image.matches(&state), order.matches(&state)]
                .iter()
                .filter(|&&m| m)
                .count();
            assert!(hits <= 1, "output {text:?} matched {hits} guards");
        }
    }
}
