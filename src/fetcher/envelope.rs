//! Response envelope validation: `{"response": <data>, ...}` → `<data>`.

use serde_json::Value;

use crate::{Error, Result};

pub(crate) const ENVELOPE_KEY: &str = "response";

/// Keys listed in a malformed-payload message before eliding the rest.
const MAX_KEYS_SHOWN: usize = 8;

/// Decode a 2xx body and take the `response` field out of it.
///
/// Strict: a body without the key is an error, never returned as-is.
pub(crate) fn extract(body: &[u8]) -> Result<Value> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| Error::malformed(format!("body is not valid JSON: {}", e)))?;

    match payload {
        Value::Object(mut map) => match map.remove(ENVELOPE_KEY) {
            Some(inner) => Ok(inner),
            None => {
                let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
                let elided = keys.len().saturating_sub(MAX_KEYS_SHOWN);
                keys.truncate(MAX_KEYS_SHOWN);
                let mut shown = keys.join(", ");
                if elided > 0 {
                    shown.push_str(&format!(", … ({} more)", elided));
                }
                Err(Error::malformed(format!(
                    "missing \"{}\" key; top-level keys: [{}]",
                    ENVELOPE_KEY, shown
                )))
            }
        },
        other => Err(Error::malformed(format!(
            "expected a JSON object with a \"{}\" key, got {}",
            ENVELOPE_KEY,
            kind(&other)
        ))),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
