//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Message <-> envelope codec with trace header propagation."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use opentelemetry::trace::TraceFlags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::envelope::{DeliveryMode, Envelope, HeaderValue, Headers};
use crate::message::{Message, Metadata};
use crate::trace::{self, SPAN_ID_HEADER, TRACE_ID_HEADER};
use crate::{MarshalingError, Result};

/// Header used to carry the message identity when none is configured.
pub const DEFAULT_MESSAGE_UUID_HEADER_KEY: &str = "_watermill_message_uuid";

/// Deprecated alias of [`DEFAULT_MESSAGE_UUID_HEADER_KEY`].
#[deprecated(note = "use DEFAULT_MESSAGE_UUID_HEADER_KEY instead")]
pub const MESSAGE_UUID_HEADER_KEY: &str = DEFAULT_MESSAGE_UUID_HEADER_KEY;

/// Hook applied to every outbound envelope as the last marshaling step.
pub type PostprocessFn = Arc<dyn Fn(Envelope) -> Envelope + Send + Sync>;

/// Converts messages into broker envelopes and back.
pub trait Marshaler: Send + Sync {
    /// Encode a message for publishing.
    fn marshal(&self, message: &Message) -> Result<Envelope>;
    /// Decode a delivered envelope.
    fn unmarshal(&self, envelope: &Envelope) -> Result<Message>;
}

/// Serializable codec settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Identity header name; empty selects [`DEFAULT_MESSAGE_UUID_HEADER_KEY`].
    pub message_uuid_header_key: String,
    /// Mark outbound envelopes transient instead of persistent.
    pub transient_delivery: bool,
}

/// Marshaler propagating the active trace context through `trace_id` and
/// `span_id` headers.
#[derive(Clone, Default)]
pub struct OtelMarshaler {
    /// Header used to store and read the message identity.
    ///
    /// Empty selects [`DEFAULT_MESSAGE_UUID_HEADER_KEY`]. A delivery without
    /// this header decodes with an empty identity.
    pub message_uuid_header_key: String,
    /// When true the delivery mode stays transient.
    ///
    /// Transient means higher throughput, but messages are not restored on
    /// broker restart even when they sit in a durable queue.
    pub not_persistent_delivery_mode: bool,
    /// Extra processing of the outbound envelope, for example setting
    /// `content_type` or `correlation_id`. Must be safe to call concurrently.
    pub postprocess_publishing: Option<PostprocessFn>,
}

impl fmt::Debug for OtelMarshaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelMarshaler")
            .field("message_uuid_header_key", &self.message_uuid_header_key)
            .field(
                "not_persistent_delivery_mode",
                &self.not_persistent_delivery_mode,
            )
            .field(
                "postprocess_publishing",
                &self.postprocess_publishing.as_ref().map(|_| "fn"),
            )
            .finish()
    }
}

impl OtelMarshaler {
    /// Marshaler with default settings: default identity header, persistent delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a marshaler from serialized settings.
    pub fn from_config(config: &CodecConfig) -> Self {
        Self {
            message_uuid_header_key: config.message_uuid_header_key.clone(),
            not_persistent_delivery_mode: config.transient_delivery,
            postprocess_publishing: None,
        }
    }

    /// Use `key` as the identity header.
    pub fn with_message_uuid_header_key(mut self, key: impl Into<String>) -> Self {
        self.message_uuid_header_key = key.into();
        self
    }

    /// Publish transient instead of persistent envelopes.
    pub fn with_transient_delivery(mut self, transient: bool) -> Self {
        self.not_persistent_delivery_mode = transient;
        self
    }

    /// Install the outbound envelope hook.
    pub fn with_postprocess<F>(mut self, hook: F) -> Self
    where
        F: Fn(Envelope) -> Envelope + Send + Sync + 'static,
    {
        self.postprocess_publishing = Some(Arc::new(hook));
        self
    }

    /// Effective identity header name.
    pub fn message_uuid_header_key(&self) -> &str {
        if self.message_uuid_header_key.is_empty() {
            DEFAULT_MESSAGE_UUID_HEADER_KEY
        } else {
            &self.message_uuid_header_key
        }
    }

    fn unmarshal_message_uuid(&self, envelope: &Envelope) -> Result<String> {
        let key = self.message_uuid_header_key();
        match envelope.headers.get(key) {
            None => Ok(String::new()),
            Some(HeaderValue::String(uuid)) => Ok(uuid.clone()),
            Some(other) => Err(MarshalingError::InvalidMessageUuid {
                header: key.to_owned(),
                found: other.type_name(),
            }),
        }
    }
}

fn is_trace_header(key: &str) -> bool {
    key == TRACE_ID_HEADER || key == SPAN_ID_HEADER
}

impl Marshaler for OtelMarshaler {
    fn marshal(&self, message: &Message) -> Result<Envelope> {
        let mut headers = Headers::new();
        for (key, value) in &message.metadata {
            headers.insert(key.clone(), HeaderValue::String(value.clone()));
        }
        headers.insert(
            self.message_uuid_header_key().to_owned(),
            HeaderValue::String(message.uuid.clone()),
        );

        if let Some(span_context) = trace::active_span_context(message.context()) {
            headers.insert(
                TRACE_ID_HEADER.to_owned(),
                HeaderValue::String(span_context.trace_id().to_string()),
            );
            headers.insert(
                SPAN_ID_HEADER.to_owned(),
                HeaderValue::String(span_context.span_id().to_string()),
            );
        }

        let mut envelope = Envelope {
            body: message.payload.clone(),
            headers,
            delivery_mode: if self.not_persistent_delivery_mode {
                DeliveryMode::Transient
            } else {
                DeliveryMode::Persistent
            },
            ..Envelope::default()
        };

        if let Some(postprocess) = &self.postprocess_publishing {
            envelope = postprocess(envelope);
        }

        Ok(envelope)
    }

    fn unmarshal(&self, envelope: &Envelope) -> Result<Message> {
        let uuid = self.unmarshal_message_uuid(envelope)?;
        let uuid_key = self.message_uuid_header_key();

        let mut message = Message::new(uuid, envelope.body.clone());
        let mut metadata = Metadata::with_capacity(envelope.headers.len().saturating_sub(1));

        for (key, value) in &envelope.headers {
            if key == uuid_key {
                continue;
            }
            match value {
                HeaderValue::String(value) => metadata.set(key.clone(), value.clone()),
                // malformed trace headers only cost the trace context
                other if is_trace_header(key) => {
                    debug!(header = %key, found = other.type_name(), "dropping non-string trace header");
                }
                other => {
                    return Err(MarshalingError::InvalidMetadata {
                        key: key.clone(),
                        found: other.type_name(),
                    })
                }
            }
        }
        message.metadata = metadata;

        let trace_id = envelope.header_str(TRACE_ID_HEADER).unwrap_or("");
        let span_id = envelope.header_str(SPAN_ID_HEADER).unwrap_or("");
        match trace::span_context_from_hex(trace_id, span_id, TraceFlags::default()) {
            Some(span_context) => {
                let cx = trace::attach_span_context(message.context(), span_context);
                message.set_context(cx);
            }
            None if envelope.headers.keys().any(|key| is_trace_header(key)) => {
                debug!(
                    message_uuid = %message.uuid,
                    trace_id,
                    span_id,
                    "ignoring malformed trace headers"
                );
            }
            None => {}
        }

        Ok(message)
    }
}
