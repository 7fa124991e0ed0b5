//! Session encoding and payload merging.
//!
//! The encoded form is the JSON object of a `SessionStamp` in standard
//! padded base64, which fits in a single text field and decodes back to the
//! exact same five values.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SubmitError};
use crate::payload::{FormValue, Payload};
use crate::session::SessionStamp;

/// Reserved payload key carrying the encoded session.
pub const SESSION_KEY: &str = "_t";

/// Encode a stamped session into a compact text token.
pub fn encode(stamp: &SessionStamp) -> Result<String> {
    let json = serde_json::to_vec(stamp)?;
    Ok(STANDARD.encode(json))
}

/// Inverse of [`encode`].
pub fn decode(token: &str) -> Result<SessionStamp> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| SubmitError::InvalidToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| SubmitError::InvalidToken(e.to_string()))
}

/// Insert `value` under `key`.
///
/// Multipart forms always gain a new field. JSON mappings gain the key only
/// if it is not already set; an existing value is left as it is.
pub fn append(payload: &mut Payload, key: &str, value: &str) {
    match payload {
        Payload::Multipart(form) => form.append(key, FormValue::Text(value.to_string())),
        Payload::Json(map) => {
            if map.contains_key(key) {
                debug!(key, "payload already sets reserved key, keeping caller value");
                return;
            }
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::FormData;
    use serde_json::{json, Map};

    fn stamp() -> SessionStamp {
        SessionStamp {
            loaded_at: 1_570_000_000_000,
            mousemove: 42,
            keydown: 7,
            webdriver: true,
            submitted_at: 1_570_000_012_345,
        }
    }

    fn mapping(value: Value) -> Payload {
        match value {
            Value::Object(map) => Payload::Json(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn encode_is_deterministic() {
        assert_eq!(encode(&stamp()).unwrap(), encode(&stamp()).unwrap());
    }

    #[test]
    fn encoded_token_is_base64_json_with_wire_keys() {
        let token = encode(&stamp()).unwrap();
        let raw = STANDARD.decode(&token).unwrap();
        let value: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            value,
            json!({
                "loadedAt": 1_570_000_000_000i64,
                "mousemove": 42,
                "keydown": 7,
                "webdriver": true,
                "submittedAt": 1_570_000_012_345i64,
            })
        );
    }

    #[test]
    fn decode_recovers_every_field() {
        let expected = stamp();
        let decoded = decode(&encode(&expected).unwrap()).unwrap();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode("not base64!"), Err(SubmitError::InvalidToken(_))));
        let not_a_session = STANDARD.encode(b"{\"hello\":1}");
        assert!(matches!(decode(&not_a_session), Err(SubmitError::InvalidToken(_))));
    }

    #[test]
    fn append_merges_into_mapping() {
        let mut payload = mapping(json!({"a": 1}));
        append(&mut payload, SESSION_KEY, "X");
        assert_eq!(payload, mapping(json!({"a": 1, "_t": "X"})));
    }

    #[test]
    fn append_keeps_existing_mapping_value() {
        let mut payload = mapping(json!({"_t": "mine", "b": [1, 2]}));
        append(&mut payload, SESSION_KEY, "X");
        assert_eq!(payload, mapping(json!({"_t": "mine", "b": [1, 2]})));
    }

    #[test]
    fn append_to_empty_mapping() {
        let mut payload = Payload::Json(Map::new());
        append(&mut payload, "k", "v");
        assert_eq!(payload, mapping(json!({"k": "v"})));
    }

    #[test]
    fn append_adds_multipart_field_even_if_present() {
        let mut payload = Payload::Multipart(FormData::new().text("_t", "mine").text("name", "Jo"));
        append(&mut payload, SESSION_KEY, "X");
        let Payload::Multipart(form) = payload else {
            panic!("payload kind changed");
        };
        assert_eq!(form.len(), 3);
        let tokens: Vec<_> = form.get_all("_t").collect();
        assert_eq!(
            tokens,
            vec![&FormValue::Text("mine".into()), &FormValue::Text("X".into())]
        );
    }
}
