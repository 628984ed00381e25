//! Session id extraction for generic host events.
//!
//! Generic events put the session id in different places depending on their
//! kind. [`EXTRACTORS`] is tried in order; the first hit wins and
//! [`UNKNOWN_SESSION`] is the terminal fallback.

use crate::record::UNKNOWN_SESSION;
use serde_json::Value;

/// Prefix of host-issued session identifiers.
pub const SESSION_ID_PREFIX: &str = "ses_";

/// Returns a session id found in an event's properties, if any.
pub type Extractor = fn(&Value) -> Option<&str>;

/// Extraction chain, highest priority first.
pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("properties.sessionID", explicit_session_id),
    ("properties.info.sessionID", info_session_id),
    ("properties.info.id", info_id),
    ("properties.part.sessionID", part_session_id),
];

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn explicit_session_id(properties: &Value) -> Option<&str> {
    non_empty_str(properties.get("sessionID"))
}

fn info_session_id(properties: &Value) -> Option<&str> {
    non_empty_str(properties.pointer("/info/sessionID"))
}

/// `info.id` is only a session id when it has the session shape; message
/// infos carry their own ids there too.
fn info_id(properties: &Value) -> Option<&str> {
    non_empty_str(properties.pointer("/info/id")).filter(|id| id.starts_with(SESSION_ID_PREFIX))
}

fn part_session_id(properties: &Value) -> Option<&str> {
    non_empty_str(properties.pointer("/part/sessionID"))
}

/// Resolve the session a generic event belongs to.
pub fn extract_session_id(properties: &Value) -> String {
    EXTRACTORS
        .iter()
        .find_map(|(_, extract)| extract(properties))
        .unwrap_or(UNKNOWN_SESSION)
        .to_string()
}

/// Last six characters of a session id, used in log file names.
pub fn short_session_id(session_id: &str) -> String {
    let count = session_id.chars().count();
    session_id.chars().skip(count.saturating_sub(6)).collect()
}
