//! ---
//! tmq_section: "03-logging"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Structured logging adapters for codec and middleware."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Message-scoped logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Identity of the message being encoded or decoded.
    pub message_uuid: Option<&'a str>,
    /// Topic the message is published to or consumed from.
    pub topic: Option<&'a str>,
    /// Hex trace id when a trace context is known.
    pub trace_id: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a message identity.
    pub fn with_message_uuid(mut self, uuid: &'a str) -> Self {
        self.message_uuid = Some(uuid);
        self
    }

    /// Attach a topic name.
    pub fn with_topic(mut self, topic: &'a str) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Attach a hex trace id.
    pub fn with_trace_id(mut self, trace_id: &'a str) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}
