//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Prometheus counters and logging around codec calls."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
use prometheus::{IntCounter, Opts, Registry};
use tracemq_logging::{tmq_debug, tmq_warn, LogContext};

use crate::envelope::Envelope;
use crate::marshaler::Marshaler;
use crate::message::Message;
use crate::Result;

/// Prometheus metric handles for codec activity.
#[derive(Clone)]
pub struct CodecMetricsExporter {
    marshaled: IntCounter,
    unmarshaled: IntCounter,
    unmarshal_failures: IntCounter,
    traces_attached: IntCounter,
}

impl CodecMetricsExporter {
    /// Register codec metrics with the provided registry.
    pub fn register(registry: &Registry) -> std::result::Result<Self, prometheus::Error> {
        let marshaled = IntCounter::with_opts(Opts::new(
            "codec_messages_marshaled_total",
            "Messages encoded into broker envelopes",
        ))?;
        let unmarshaled = IntCounter::with_opts(Opts::new(
            "codec_messages_unmarshaled_total",
            "Envelopes decoded into messages",
        ))?;
        let unmarshal_failures = IntCounter::with_opts(Opts::new(
            "codec_unmarshal_failures_total",
            "Envelopes rejected because of non-string headers",
        ))?;
        let traces_attached = IntCounter::with_opts(Opts::new(
            "codec_trace_contexts_attached_total",
            "Decoded messages carrying a restored trace context",
        ))?;

        registry.register(Box::new(marshaled.clone()))?;
        registry.register(Box::new(unmarshaled.clone()))?;
        registry.register(Box::new(unmarshal_failures.clone()))?;
        registry.register(Box::new(traces_attached.clone()))?;

        Ok(Self {
            marshaled,
            unmarshaled,
            unmarshal_failures,
            traces_attached,
        })
    }

    /// Record an encoded message.
    pub fn observe_marshaled(&self) {
        self.marshaled.inc();
    }

    /// Record a decoded message, noting whether it carries a trace.
    pub fn observe_unmarshaled(&self, trace_attached: bool) {
        self.unmarshaled.inc();
        if trace_attached {
            self.traces_attached.inc();
        }
    }

    /// Record a rejected envelope.
    pub fn observe_unmarshal_failure(&self) {
        self.unmarshal_failures.inc();
    }
}

/// Decorator counting and logging every call to the wrapped marshaler.
pub struct InstrumentedMarshaler<M> {
    inner: M,
    metrics: CodecMetricsExporter,
}

impl<M: Marshaler> InstrumentedMarshaler<M> {
    /// Wrap `inner`, reporting to `metrics`.
    pub fn new(inner: M, metrics: CodecMetricsExporter) -> Self {
        Self { inner, metrics }
    }

    /// Borrow the wrapped marshaler.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: Marshaler> Marshaler for InstrumentedMarshaler<M> {
    fn marshal(&self, message: &Message) -> Result<Envelope> {
        let envelope = self.inner.marshal(message)?;
        self.metrics.observe_marshaled();
        let ctx = LogContext::new().with_message_uuid(&message.uuid);
        tmq_debug!(context = ctx, "message marshaled with {} headers", envelope.headers.len());
        Ok(envelope)
    }

    fn unmarshal(&self, envelope: &Envelope) -> Result<Message> {
        match self.inner.unmarshal(envelope) {
            Ok(message) => {
                let span_context = message.span_context();
                self.metrics.observe_unmarshaled(span_context.is_valid());
                let trace_id = span_context.trace_id().to_string();
                let ctx = LogContext::new()
                    .with_message_uuid(&message.uuid)
                    .with_trace_id(&trace_id);
                tmq_debug!(context = ctx, "envelope unmarshaled");
                Ok(message)
            }
            Err(err) => {
                self.metrics.observe_unmarshal_failure();
                tmq_warn!("rejecting envelope: {}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::HeaderValue;
    use crate::marshaler::OtelMarshaler;
    use crate::trace::{SPAN_ID_HEADER, TRACE_ID_HEADER};

    fn counter(registry: &Registry, name: &str) -> f64 {
        registry
            .gather()
            .iter()
            .find(|family| family.get_name() == name)
            .map(|family| family.get_metric()[0].get_counter().get_value())
            .unwrap_or_default()
    }

    #[test]
    fn counts_successes_failures_and_traces() {
        let registry = Registry::new();
        let metrics = CodecMetricsExporter::register(&registry).expect("register metrics");
        let marshaler = InstrumentedMarshaler::new(OtelMarshaler::new(), metrics);

        let mut message = Message::new("id-1", &b"x"[..]);
        message.metadata.set(TRACE_ID_HEADER, "4bf92f3577b34da6a3ce929d0e0e4736");
        message.metadata.set(SPAN_ID_HEADER, "00f067aa0ba902b7");
        let envelope = marshaler.marshal(&message).expect("marshal");
        marshaler.unmarshal(&envelope).expect("unmarshal");

        let mut bad = envelope.clone();
        bad.headers.insert("x-count".into(), HeaderValue::Int(1));
        assert!(marshaler.unmarshal(&bad).is_err());

        assert_eq!(counter(&registry, "codec_messages_marshaled_total"), 1.0);
        assert_eq!(counter(&registry, "codec_messages_unmarshaled_total"), 1.0);
        assert_eq!(counter(&registry, "codec_unmarshal_failures_total"), 1.0);
        assert_eq!(counter(&registry, "codec_trace_contexts_attached_total"), 1.0);
    }

    #[test]
    fn registering_twice_fails() {
        let registry = Registry::new();
        CodecMetricsExporter::register(&registry).expect("first registration");
        assert!(CodecMetricsExporter::register(&registry).is_err());
    }
}
