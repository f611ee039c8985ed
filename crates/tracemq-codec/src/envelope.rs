//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Broker envelope model: body, header table, delivery attributes."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Flat header table attached to an envelope.
pub type Headers = BTreeMap<String, HeaderValue>;

/// Value stored in an envelope header table.
///
/// The broker wire format allows more than strings; the codec only ever writes
/// [`HeaderValue::String`] and rejects anything else on decode.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    /// Explicit absence of a value.
    Void,
    /// Boolean flag.
    Bool(bool),
    /// 16-bit signed integer.
    ShortInt(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Raw byte array.
    Bytes(Vec<u8>),
    /// Seconds since the Unix epoch.
    Timestamp(u64),
    /// Ordered list of values.
    Array(Vec<HeaderValue>),
    /// Nested table.
    Table(BTreeMap<String, HeaderValue>),
}

impl HeaderValue {
    /// Short name of the value's wire type, used in error reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            HeaderValue::Void => "void",
            HeaderValue::Bool(_) => "bool",
            HeaderValue::ShortInt(_) => "short-int",
            HeaderValue::Int(_) => "int",
            HeaderValue::Long(_) => "long",
            HeaderValue::Float(_) => "float",
            HeaderValue::Double(_) => "double",
            HeaderValue::String(_) => "string",
            HeaderValue::Bytes(_) => "bytes",
            HeaderValue::Timestamp(_) => "timestamp",
            HeaderValue::Array(_) => "array",
            HeaderValue::Table(_) => "table",
        }
    }

    /// Borrow the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::String(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::String(value.to_owned())
    }
}

/// Durability hint attached to a published envelope.
///
/// Unrelated to queue durability: transient messages are not restored to
/// durable queues after a broker restart, persistent ones are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Higher throughput, lost on broker restart.
    #[default]
    Transient,
    /// Written to disk by the broker when routed to a durable queue.
    Persistent,
}

impl DeliveryMode {
    /// Wire value of the delivery mode property.
    pub const fn as_u8(self) -> u8 {
        match self {
            DeliveryMode::Transient => 1,
            DeliveryMode::Persistent => 2,
        }
    }
}

/// Transport-level representation of a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    /// Message body, byte-for-byte equal to the logical payload.
    pub body: Bytes,
    /// Identity, trace and application metadata headers.
    pub headers: Headers,
    /// Durability hint for the broker.
    pub delivery_mode: DeliveryMode,
    /// MIME content type.
    pub content_type: Option<String>,
    /// MIME content encoding.
    pub content_encoding: Option<String>,
    /// Correlation identifier for request/reply flows.
    pub correlation_id: Option<String>,
    /// Queue name replies should be sent to.
    pub reply_to: Option<String>,
    /// Broker-level message identifier.
    pub message_id: Option<String>,
    /// Message priority, 0 to 9.
    pub priority: Option<u8>,
    /// Per-message TTL in milliseconds, as a string.
    pub expiration: Option<String>,
    /// Seconds since the Unix epoch.
    pub timestamp: Option<u64>,
    /// Application message type name.
    pub kind: Option<String>,
    /// Publishing application identifier.
    pub app_id: Option<String>,
    /// Authenticated user identifier.
    pub user_id: Option<String>,
}

impl Envelope {
    /// Borrow the string value of `key`, if present and string-typed.
    pub fn header_str(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(HeaderValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_mode_wire_values() {
        assert_eq!(DeliveryMode::Transient.as_u8(), 1);
        assert_eq!(DeliveryMode::Persistent.as_u8(), 2);
    }

    #[test]
    fn only_strings_are_exposed_as_str() {
        assert_eq!(HeaderValue::from("abc").as_str(), Some("abc"));
        assert_eq!(HeaderValue::Long(7).as_str(), None);
        assert_eq!(HeaderValue::Long(7).type_name(), "long");
        assert_eq!(HeaderValue::Table(BTreeMap::new()).type_name(), "table");
    }

    #[test]
    fn header_str_skips_non_string_values() {
        let mut envelope = Envelope::default();
        envelope.headers.insert("a".into(), "x".into());
        envelope.headers.insert("b".into(), HeaderValue::Bool(true));
        assert_eq!(envelope.header_str("a"), Some("x"));
        assert_eq!(envelope.header_str("b"), None);
        assert_eq!(envelope.header_str("c"), None);
    }
}
