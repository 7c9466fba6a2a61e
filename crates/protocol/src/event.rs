use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::error::Result;

/// Field name carrying an event payload.
pub const DATA_FIELD: &str = "data";

/// Field name carrying the event type.
pub const EVENT_FIELD: &str = "event";

/// Event type of a produced value.
pub const EVENT_YIELD: &str = "yield";

/// Event type of a terminal failure.
pub const EVENT_EXCEPTION: &str = "exception";

/// One unit on the streaming transport: a map of field names to values.
///
/// The variants of the protocol are expressed through the `event` field:
/// `yield` carries a transport-encoded payload in `data`, `exception` carries
/// a failure description in `data`, and pings travel as comment lines that
/// never become an `Event` at all.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Event {
    fields: BTreeMap<String, String>,
}

impl Event {
    /// Creates an empty event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A `yield` event carrying an already transport-encoded payload.
    #[must_use]
    pub fn yield_data(payload: impl Into<String>) -> Self {
        let mut event = Self::new();
        event.push_field(EVENT_FIELD, EVENT_YIELD);
        event.push_field(DATA_FIELD, &payload.into());
        event
    }

    /// A terminal `exception` event carrying a failure description.
    #[must_use]
    pub fn exception(description: impl Into<String>) -> Self {
        let mut event = Self::new();
        event.push_field(EVENT_FIELD, EVENT_EXCEPTION);
        event.push_field(DATA_FIELD, &description.into());
        event
    }

    /// Sets a field, or appends to it joined by a newline if it is already
    /// present (multi-line `data`).
    pub fn push_field(&mut self, name: &str, value: &str) {
        match self.fields.get_mut(name) {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => {
                self.fields.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    /// Returns a field value by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The `event` field, naming the variant of this event.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.field(EVENT_FIELD)
    }

    /// The `data` field.
    #[must_use]
    pub fn data(&self) -> Option<&str> {
        self.field(DATA_FIELD)
    }

    /// Whether no fields have been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the event as `field: value` lines terminated by a blank line.
    ///
    /// Multi-line values are emitted as repeated `field:` lines, which the
    /// parser on the other side rejoins with newlines.
    #[must_use]
    pub fn to_wire(&self) -> Bytes {
        let mut out = String::new();
        for (name, value) in &self.fields {
            for part in value.split('\n') {
                out.push_str(name);
                out.push_str(": ");
                out.push_str(part);
                out.push('\n');
            }
        }
        out.push('\n');
        Bytes::from(out)
    }
}

/// The keep-alive comment frame. Parsers discard it without producing an
/// event.
#[must_use]
pub fn ping_frame() -> Bytes {
    Bytes::from_static(b": ping\n\n")
}

/// Transport-encodes serializer output so arbitrary binary payloads can
/// travel through the line-oriented event protocol.
#[must_use]
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Reverses [`encode_payload`].
///
/// # Errors
///
/// Returns [`crate::Error::Base64`] if the payload is not valid base64.
pub fn decode_payload(text: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yield_event_wire_format() {
        let event = Event::yield_data("aGVsbG8=");
        assert_eq!(event.to_wire(), "data: aGVsbG8=\nevent: yield\n\n");
    }

    #[test]
    fn test_exception_event_wire_format() {
        let event = Event::exception("ValueError: bad input");
        assert_eq!(event.to_wire(), "data: ValueError: bad input\nevent: exception\n\n");
    }

    #[test]
    fn test_multiline_value_renders_repeated_fields() {
        let mut event = Event::new();
        event.push_field(DATA_FIELD, "first");
        event.push_field(DATA_FIELD, "second");
        assert_eq!(event.to_wire(), "data: first\ndata: second\n\n");
    }

    #[test]
    fn test_payload_round_trip() {
        let payload = b"\x00\x01binary\xff";
        let encoded = encode_payload(payload);
        assert_eq!(decode_payload(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_invalid_payload_rejected() {
        assert!(decode_payload("not base64 !").is_err());
    }
}
