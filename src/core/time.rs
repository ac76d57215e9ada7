//! Timestamp and envelope helpers shared by the broker and the CLI.

use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Envelope printed by the CLI when an operation fails. `result` carries any
/// payload the operation still produced (e.g. `{"registered":false}`).
pub fn error_envelope(op: &str, code: &str, message: &str, result: Option<JsonValue>) -> JsonValue {
    serde_json::json!({
        "ts": now_epoch_z(),
        "event_id": new_event_id(),
        "op": op,
        "status": "error",
        "code": code,
        "message": message,
        "result": result.unwrap_or(JsonValue::Null),
    })
}
