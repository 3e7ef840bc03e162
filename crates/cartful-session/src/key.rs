//! Time-windowed session key derivation.
//!
//! Turns from the same conversation landing in the same tumbling window
//! share a key; a turn one window later gets a fresh key even when only
//! a second has passed since the boundary. The hard cutover is accepted
//! as a coarse affinity mechanism.

use chrono::Utc;

/// Derive the correlation key for a conversation at a point in time.
pub fn derive_key(conversation_id: &str, clock_seconds: i64, window_seconds: i64) -> String {
    format!("{}-{}", conversation_id, clock_seconds / window_seconds)
}

/// Derive the key for a conversation right now.
pub fn current_key(conversation_id: &str, window_seconds: i64) -> String {
    derive_key(conversation_id, Utc::now().timestamp(), window_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: i64 = 600;

    #[test]
    fn test_same_window_same_key() {
        let base = 1_700_000_400; // window-aligned
        assert_eq!(
            derive_key("491701234567", base, WINDOW),
            derive_key("491701234567", base + WINDOW - 1, WINDOW),
        );
    }

    #[test]
    fn test_one_window_apart_differs() {
        let base = 1_700_000_400;
        assert_ne!(
            derive_key("491701234567", base, WINDOW),
            derive_key("491701234567", base + WINDOW, WINDOW),
        );
    }

    #[test]
    fn test_boundary_crossing_one_second_apart_differs() {
        let just_before = 1_700_000_400 + WINDOW - 1;
        assert_ne!(
            derive_key("491701234567", just_before, WINDOW),
            derive_key("491701234567", just_before + 1, WINDOW),
        );
    }

    #[test]
    fn test_different_conversations_never_collide() {
        let at = 1_700_000_450;
        assert_ne!(
            derive_key("491701234567", at, WINDOW),
            derive_key("491709999999", at, WINDOW),
        );
    }

    #[test]
    fn test_key_shape() {
        assert_eq!(derive_key("conv1", 1200, 600), "conv1-2");
    }
}
