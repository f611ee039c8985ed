//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Handler middleware restoring trace context from message metadata."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
//! Messages forwarded by a process that copies metadata but not envelope
//! headers still carry `trace_id`/`span_id` in their metadata. Wrapping a
//! handler with [`trace_rehydration`] re-attaches that trace before the
//! handler runs, so work started by the handler joins the original trace.
use opentelemetry::trace::TraceFlags;

use crate::message::Message;
use crate::trace::{self, SPAN_ID_HEADER, TRACE_ID_HEADER};

/// Message handler invoked once per delivered message.
pub trait Handler {
    /// Error surfaced to the subscriber loop.
    type Error;

    /// Process a message, optionally producing messages to publish.
    fn handle(&self, message: Message) -> Result<Vec<Message>, Self::Error>;
}

impl<F, E> Handler for F
where
    F: Fn(Message) -> Result<Vec<Message>, E>,
{
    type Error = E;

    fn handle(&self, message: Message) -> Result<Vec<Message>, E> {
        self(message)
    }
}

/// Attach the trace named by the `trace_id`/`span_id` metadata entries to the
/// message's execution context.
///
/// Returns `false` and leaves the message untouched when either entry is
/// missing, empty or not a valid hex id.
pub fn rehydrate_trace_context(message: &mut Message) -> bool {
    let trace_id = message.metadata.get(TRACE_ID_HEADER);
    let span_id = message.metadata.get(SPAN_ID_HEADER);
    if trace_id.is_empty() || span_id.is_empty() {
        return false;
    }

    let Some(span_context) = trace::span_context_from_hex(trace_id, span_id, TraceFlags::SAMPLED)
    else {
        return false;
    };
    let cx = trace::attach_span_context(message.context(), span_context);
    message.set_context(cx);
    true
}

/// Middleware wrapping a [`Handler`] with trace rehydration.
#[derive(Debug, Clone)]
pub struct TraceRehydrator<H> {
    inner: H,
}

impl<H> TraceRehydrator<H> {
    /// Wrap `inner`.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    /// Unwrap the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: Handler> Handler for TraceRehydrator<H> {
    type Error = H::Error;

    fn handle(&self, mut message: Message) -> Result<Vec<Message>, Self::Error> {
        rehydrate_trace_context(&mut message);
        self.inner.handle(message)
    }
}

/// Wrap `handler` so every message gets its trace context restored first.
pub fn trace_rehydration<H: Handler>(handler: H) -> TraceRehydrator<H> {
    TraceRehydrator::new(handler)
}
