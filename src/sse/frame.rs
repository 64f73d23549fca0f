//! Wire encoding of the server side of an SSE stream.

use bytes::Bytes;
use serde::Serialize;

use crate::{RelayEvent, Result};

/// Comment-only frame keeping intermediaries from closing an idle stream.
pub const HEARTBEAT: &[u8] = b":ping\n\n";

pub const CONTENT_TYPE: &str = "text/event-stream";
pub const CACHE_CONTROL: &str = "no-cache, no-transform";
pub const CONNECTION: &str = "keep-alive";

/// Render `value` as a single `data: <json>\n\n` frame.
///
/// Serialized JSON never contains a raw newline, so one `data:` line
/// always suffices.
pub fn data_frame<T: Serialize>(value: &T) -> Result<Bytes> {
    let json = serde_json::to_string(value)?;
    let mut frame = String::with_capacity(json.len() + 8);
    frame.push_str("data: ");
    frame.push_str(&json);
    frame.push_str("\n\n");
    Ok(Bytes::from(frame))
}

#[inline]
pub fn heartbeat() -> Bytes {
    Bytes::from_static(HEARTBEAT)
}

/// The frame opening every cafe stream.
pub fn handshake(cafe_id: &str) -> Result<Bytes> {
    data_frame(&RelayEvent::handshake(cafe_id))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_data_frame() {
        let frame = data_frame(&json!({"type": "doorbell"})).unwrap();
        assert_eq!(&frame[..], b"data: {\"type\":\"doorbell\"}\n\n");
    }

    #[test]
    fn test_multiline_payload_stays_on_one_line() {
        let frame = data_frame(&json!({"note": "a\nb"})).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert_eq!(text.matches('\n').count(), 2);
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_handshake() {
        let frame = handshake("c1").unwrap();
        assert!(frame.starts_with(b"data: {\"type\":\"connected\",\"cafeId\":\"c1\""));
        assert!(frame.ends_with(b"\n\n"));
    }

    #[test]
    fn test_heartbeat() {
        assert_eq!(&heartbeat()[..], b":ping\n\n");
    }
}
