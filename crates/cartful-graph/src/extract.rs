//! Recovery of the terminal node's final text from an execution state.
//!
//! Capability responses may arrive with transport-level escaping (the
//! backend serializes the body into a JSON-ish envelope) and may embed
//! reasoning scratchpad blocks that must never reach the customer.

use std::sync::OnceLock;

use regex::Regex;

use cartful_core::types::ExecutionState;

/// Stands in for an escaped backslash while the multi-character escape
/// sequences are resolved. Private-use codepoint, cannot occur in
/// capability output.
const BACKSLASH_PLACEHOLDER: char = '\u{e000}';

fn reasoning_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<thinking>.*?</thinking>").unwrap())
}

fn blank_runs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Reverse the escaping applied when a capability response body was
/// serialized for transport.
///
/// The escaped-backslash sequence is parked on a placeholder before the
/// multi-character escapes are resolved, so `\\n` round-trips to a
/// literal backslash followed by `n` rather than a newline.
pub fn unescape_transport(text: &str) -> String {
    let mut out = text.replace("\\\\", &BACKSLASH_PLACEHOLDER.to_string());
    out = out
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
        .replace("\\\"", "\"")
        .replace("\\'", "'");
    out.replace(BACKSLASH_PLACEHOLDER, "\\")
}

/// The escaping `unescape_transport` reverses. Test support and the
/// occasional re-serialization path.
pub fn escape_transport(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
        .replace('"', "\\\"")
        .replace('\'', "\\'")
}

/// Remove reasoning scratchpad blocks, content included, and collapse
/// the blank-line runs left behind to at most one blank line.
pub fn strip_reasoning(text: &str) -> String {
    let stripped = reasoning_re().replace_all(text, "");
    blank_runs_re().replace_all(&stripped, "\n\n").trim().to_string()
}

/// Final text of the terminal node's most recent execution, cleaned for
/// presentation. `None` when the terminal never executed; callers must
/// substitute a fallback message rather than show empty text.
pub fn extract_final(state: &ExecutionState, terminal_node_id: &str) -> Option<String> {
    let result = state.latest(terminal_node_id)?;
    Some(strip_reasoning(&unescape_transport(&result.text)))
}
