//! Pluggable payload codecs and the registry that negotiates them from
//! request headers.
//!
//! Serializers are stateless, registered once before serving begins, and
//! shared process-wide. Negotiation prefers the logical `serializer` header
//! name over the `content-type` fallback and never silently substitutes a
//! default codec.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;

pub use error::{Error, Result};

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

/// A named, content-type-tagged codec for call payloads and results.
///
/// Implementations are immutable transform pairs; one instance serves every
/// call for the process lifetime.
pub trait Serializer: Send + Sync + 'static {
    /// The logical codec name carried in the `serializer` header.
    fn name(&self) -> &'static str;

    /// The MIME content type for non-streaming bodies.
    fn content_type(&self) -> &'static str;

    /// Encodes a wire value to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the value cannot be represented by this
    /// codec.
    fn encode(&self, value: &Value) -> Result<Bytes>;

    /// Decodes bytes back into a wire value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for malformed input.
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// The JSON codec (`json`, `application/json`).
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, value: &Value) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|error| Error::Encode {
                name: self.name(),
                message: error.to_string(),
            })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes).map_err(|error| Error::Decode {
            name: self.name(),
            message: error.to_string(),
        })
    }
}

/// The CBOR codec (`cbor`, `application/cbor`) for binary payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct CborSerializer;

impl Serializer for CborSerializer {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn content_type(&self) -> &'static str {
        "application/cbor"
    }

    fn encode(&self, value: &Value) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf).map_err(|error| Error::Encode {
            name: self.name(),
            message: error.to_string(),
        })?;
        Ok(Bytes::from(buf))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        ciborium::de::from_reader(bytes).map_err(|error| Error::Decode {
            name: self.name(),
            message: error.to_string(),
        })
    }
}

/// Process-wide, read-mostly codec registry keyed by name and content type.
///
/// Registration is expected to happen before any call dispatch; afterwards
/// the registry is only read, so it needs no locking.
pub struct SerializerRegistry {
    by_name: HashMap<&'static str, Arc<dyn Serializer>>,
    by_content_type: HashMap<&'static str, Arc<dyn Serializer>>,
}

impl Default for SerializerRegistry {
    /// A registry with the built-in JSON and CBOR codecs.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(JsonSerializer));
        registry.register(Arc::new(CborSerializer));
        registry
    }
}

impl SerializerRegistry {
    /// Creates a registry with no codecs.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
            by_content_type: HashMap::new(),
        }
    }

    /// Registers a codec under its name and content type. Registering a
    /// duplicate name or content type overwrites the earlier entry.
    pub fn register(&mut self, serializer: Arc<dyn Serializer>) {
        self.by_name.insert(serializer.name(), Arc::clone(&serializer));
        self.by_content_type
            .insert(serializer.content_type(), serializer);
    }

    /// Looks up a codec by its logical name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] if no codec is registered under `name`.
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn Serializer>> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownName(name.to_owned()))
    }

    /// Looks up a codec by content type, ignoring MIME parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownContentType`] if no codec matches.
    pub fn by_content_type(&self, content_type: &str) -> Result<Arc<dyn Serializer>> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();
        self.by_content_type
            .get(media_type)
            .cloned()
            .ok_or_else(|| Error::UnknownContentType(content_type.to_owned()))
    }

    /// Resolves the codec for a request.
    ///
    /// An explicit `serializer` header wins over `content-type`; empty
    /// header values count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeaders`] when neither header carries a
    /// value, distinguishable from [`Error::UnknownName`] and
    /// [`Error::UnknownContentType`] for values that name no codec.
    pub fn negotiate(
        &self,
        serializer: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<Arc<dyn Serializer>> {
        let serializer = serializer.filter(|value| !value.trim().is_empty());
        let content_type = content_type.filter(|value| !value.trim().is_empty());

        match (serializer, content_type) {
            (Some(name), _) => self.by_name(name),
            (None, Some(content_type)) => self.by_content_type(content_type),
            (None, None) => Err(Error::MissingHeaders),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_values() -> Vec<Value> {
        vec![
            json!(null),
            json!(true),
            json!(42),
            json!(-7),
            json!(2.5),
            json!("hi Aber"),
            json!([0, 1, 2, 3, 4]),
            json!({"name": "Aber", "nested": {"xs": [1, 2]}}),
        ]
    }

    #[test]
    fn test_json_round_trip() {
        let serializer = JsonSerializer;
        for value in sample_values() {
            let encoded = serializer.encode(&value).unwrap();
            assert_eq!(serializer.decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_cbor_round_trip() {
        let serializer = CborSerializer;
        for value in sample_values() {
            let encoded = serializer.encode(&value).unwrap();
            assert_eq!(serializer.decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_decode_malformed_bytes() {
        assert!(matches!(
            JsonSerializer.decode(b"{not json"),
            Err(Error::Decode { name: "json", .. })
        ));
    }

    #[test]
    fn test_serializer_header_wins_over_content_type() {
        let registry = SerializerRegistry::default();
        let serializer = registry
            .negotiate(Some("json"), Some("application/cbor"))
            .unwrap();
        assert_eq!(serializer.name(), "json");
    }

    #[test]
    fn test_content_type_fallback() {
        let registry = SerializerRegistry::default();
        let serializer = registry.negotiate(None, Some("application/cbor")).unwrap();
        assert_eq!(serializer.name(), "cbor");
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        let registry = SerializerRegistry::default();
        let serializer = registry
            .negotiate(None, Some("application/json; charset=utf-8"))
            .unwrap();
        assert_eq!(serializer.name(), "json");
    }

    #[test]
    fn test_missing_headers_is_distinct_from_unknown() {
        let registry = SerializerRegistry::default();
        assert!(matches!(
            registry.negotiate(None, None),
            Err(Error::MissingHeaders)
        ));
        assert!(matches!(
            registry.negotiate(Some("yaml"), None),
            Err(Error::UnknownName(name)) if name == "yaml"
        ));
        assert!(matches!(
            registry.negotiate(None, Some("text/plain")),
            Err(Error::UnknownContentType(_))
        ));
    }

    #[test]
    fn test_empty_header_values_count_as_absent() {
        let registry = SerializerRegistry::default();
        let serializer = registry.negotiate(Some(""), Some("application/json")).unwrap();
        assert_eq!(serializer.name(), "json");
        assert!(matches!(
            registry.negotiate(Some(""), Some("")),
            Err(Error::MissingHeaders)
        ));
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = SerializerRegistry::default();
        assert_eq!(registry.by_name("cbor").unwrap().name(), "cbor");
        assert!(registry.by_name("msgpack").is_err());
    }
}
