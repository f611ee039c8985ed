//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Message codec and trace context propagation for broker transports."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
//! Translation between logical messages and broker envelopes.
//!
//! Outbound, a [`Message`] is marshaled into an [`Envelope`] whose headers
//! carry the message identity, the application metadata and, when the
//! execution context holds a valid span, the `trace_id`/`span_id` pair.
//! Inbound, the envelope is unmarshaled back and the trace context is
//! re-attached. [`TraceRehydrator`] restores a context from metadata for
//! messages that reached a handler without going through the codec.
#![warn(missing_docs)]

pub mod envelope;
pub mod marshaler;
pub mod message;
pub mod metrics;
pub mod rehydrate;
pub mod topology;
pub mod trace;

/// Shared result type for codec operations.
pub type Result<T> = std::result::Result<T, MarshalingError>;

/// Failures raised while unmarshaling an envelope.
///
/// Both variants mean the producer wrote headers this consumer cannot
/// represent; they are never retried at this layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalingError {
    /// The identity header exists but is not a string.
    #[error("message uuid header {header} is not a string, but {found}")]
    InvalidMessageUuid {
        /// Name of the identity header.
        header: String,
        /// Wire type found instead.
        found: &'static str,
    },
    /// An application header exists but is not a string.
    #[error("metadata {key} is not a string, but {found}")]
    InvalidMetadata {
        /// Offending header key.
        key: String,
        /// Wire type found instead.
        found: &'static str,
    },
}

pub use envelope::{DeliveryMode, Envelope, HeaderValue, Headers};
pub use marshaler::{
    CodecConfig, Marshaler, OtelMarshaler, PostprocessFn, DEFAULT_MESSAGE_UUID_HEADER_KEY,
};
#[allow(deprecated)]
pub use marshaler::MESSAGE_UUID_HEADER_KEY;
pub use message::{Message, Metadata};
pub use metrics::{CodecMetricsExporter, InstrumentedMarshaler};
pub use rehydrate::{rehydrate_trace_context, trace_rehydration, Handler, TraceRehydrator};
pub use topology::{
    generate_empty_name, generate_queue_name_topic_name, DefaultTopologyBuilder,
    DurableQueueConfig, NameGenerator, TopologyBuilder, TopologyConfig, TopologyPlan,
};
pub use trace::{SPAN_ID_HEADER, TRACE_ID_HEADER};
