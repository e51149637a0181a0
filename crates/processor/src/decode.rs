//! Payload decoding
//!
//! Upstream messages are UTF-8 JSON objects. Anything else is rejected with
//! [`DecodeError::MalformedPayload`]; the caller drops the payload.

use crate::error::{DecodeError, DecodeResult};
use retail_types::RawEvent;
use serde_json::Value;

/// Decode a raw payload into an event
///
/// Leading and trailing whitespace is ignored.
pub fn decode(payload: &[u8]) -> DecodeResult<RawEvent> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| DecodeError::malformed(format!("invalid UTF-8: {}", e), payload))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(DecodeError::malformed("empty payload", payload));
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(fields)) => Ok(RawEvent::new(fields)),
        Ok(other) => Err(DecodeError::malformed(
            format!("expected a JSON object, found {}", json_kind(&other)),
            payload,
        )),
        Err(e) => Err(DecodeError::malformed(e.to_string(), payload)),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_object() {
        let event = decode(br#"{"event": "view_item", "user_id": "UID1"}"#).unwrap();
        assert_eq!(event.event_name(), Some("view_item"));
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn test_decode_tolerates_surrounding_whitespace() {
        let event = decode(b"  \n{\"event\": \"purchase\"}\r\n\t").unwrap();
        assert_eq!(event.event_name(), Some("purchase"));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let err = decode(b"{\"event\": ").unwrap_err();
        assert_eq!(err.error_type(), "malformed_payload");
    }

    #[test]
    fn test_decode_rejects_non_object() {
        for payload in [&b"[1, 2]"[..], b"\"view_item\"", b"42", b"null"] {
            let err = decode(payload).unwrap_err();
            assert!(err.to_string().contains("expected a JSON object"), "{err}");
        }
    }

    #[test]
    fn test_decode_rejects_empty_and_invalid_utf8() {
        assert!(decode(b"").is_err());
        assert!(decode(b"   ").is_err());
        assert!(decode(&[0xff, 0xfe, b'{', b'}']).is_err());
    }
}
