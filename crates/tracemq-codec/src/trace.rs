//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Hex encoding of trace and span identifiers carried in headers."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
//! Trace identifiers travel as two lowercase hex strings. Parsing follows the
//! W3C rules: fixed width, lowercase only, never all zeros.
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::Context;

/// Header and metadata key carrying the hex trace id.
pub const TRACE_ID_HEADER: &str = "trace_id";
/// Header and metadata key carrying the hex span id.
pub const SPAN_ID_HEADER: &str = "span_id";

const TRACE_ID_HEX_LEN: usize = 32;
const SPAN_ID_HEX_LEN: usize = 16;

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Parse a 32 character lowercase hex trace id.
pub fn parse_trace_id(value: &str) -> Option<TraceId> {
    if !is_lower_hex(value, TRACE_ID_HEX_LEN) {
        return None;
    }
    TraceId::from_hex(value)
        .ok()
        .filter(|id| *id != TraceId::INVALID)
}

/// Parse a 16 character lowercase hex span id.
pub fn parse_span_id(value: &str) -> Option<SpanId> {
    if !is_lower_hex(value, SPAN_ID_HEX_LEN) {
        return None;
    }
    SpanId::from_hex(value).ok().filter(|id| *id != SpanId::INVALID)
}

/// Build a local (non-remote) span context from hex ids.
///
/// Returns `None` unless both ids parse.
pub fn span_context_from_hex(trace_id: &str, span_id: &str, flags: TraceFlags) -> Option<SpanContext> {
    let trace_id = parse_trace_id(trace_id)?;
    let span_id = parse_span_id(span_id)?;
    Some(SpanContext::new(
        trace_id,
        span_id,
        flags,
        false,
        TraceState::default(),
    ))
}

/// Valid span context of the active span in `cx`, if any.
pub fn active_span_context(cx: &Context) -> Option<SpanContext> {
    let span = cx.span();
    let span_context = span.span_context();
    span_context.is_valid().then(|| span_context.clone())
}

/// Derive a context from `parent` whose active span carries `span_context`.
pub fn attach_span_context(parent: &Context, span_context: SpanContext) -> Context {
    parent.with_remote_span_context(span_context)
}
