//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Logical message model carried through the application."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
use std::collections::hash_map::{self, HashMap};

use bytes::Bytes;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry::Context;
use uuid::Uuid;

/// String key/value metadata attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(HashMap<String, String>);

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty metadata with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(HashMap::with_capacity(capacity))
    }

    /// Value stored under `key`, or an empty string when absent.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// Insert or replace the value stored under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Whether `key` is present, even with an empty value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all key/value pairs in arbitrary order.
    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a String);
    type IntoIter = hash_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Unit of work exchanged between the application and a broker.
#[derive(Debug, Clone)]
pub struct Message {
    /// Opaque identity, a UUID in practice.
    pub uuid: String,
    /// Transport-transparent body.
    pub payload: Bytes,
    /// Application metadata; values are always strings.
    pub metadata: Metadata,
    context: Context,
}

impl Message {
    /// Construct a message with empty metadata and an empty execution context.
    pub fn new(uuid: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            uuid: uuid.into(),
            payload: payload.into(),
            metadata: Metadata::new(),
            context: Context::new(),
        }
    }

    /// Construct a message identified by a freshly generated v4 UUID.
    pub fn with_new_uuid(payload: impl Into<Bytes>) -> Self {
        Self::new(Uuid::new_v4().to_string(), payload)
    }

    /// Execution context the message is processed under.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Replace the execution context.
    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    /// Span context of the active span in the execution context.
    ///
    /// Returns an invalid span context when no span is attached.
    pub fn span_context(&self) -> SpanContext {
        self.context.span().span_context().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_get_defaults_to_empty() {
        let mut metadata = Metadata::new();
        assert_eq!(metadata.get("missing"), "");
        metadata.set("tenant", "acme");
        assert_eq!(metadata.get("tenant"), "acme");
        assert!(metadata.contains_key("tenant"));
        assert_eq!(metadata.remove("tenant").as_deref(), Some("acme"));
        assert!(metadata.is_empty());
    }

    #[test]
    fn metadata_collects_from_pairs() {
        let metadata: Metadata = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata.get("b"), "2");
    }

    #[test]
    fn new_message_has_no_trace_context() {
        let message = Message::new("id-1", &b"payload"[..]);
        assert_eq!(message.uuid, "id-1");
        assert_eq!(&message.payload[..], b"payload");
        assert!(!message.span_context().is_valid());
    }

    #[test]
    fn generated_uuids_are_distinct() {
        let a = Message::with_new_uuid(Bytes::new());
        let b = Message::with_new_uuid(Bytes::new());
        assert_ne!(a.uuid, b.uuid);
        assert!(Uuid::parse_str(&a.uuid).is_ok());
    }
}
