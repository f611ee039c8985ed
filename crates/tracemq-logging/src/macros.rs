//! ---
//! tmq_section: "03-logging"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Structured logging adapters for codec and middleware."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
//! Logging macros enriched with message context.

#[doc(hidden)]
#[macro_export]
macro_rules! __tmq_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            message_uuid = ctx.message_uuid.unwrap_or(""),
            topic = ctx.topic.unwrap_or(""),
            trace_id = ctx.trace_id.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with message context.
#[macro_export]
macro_rules! tmq_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__tmq_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__tmq_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with message context.
#[macro_export]
macro_rules! tmq_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__tmq_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__tmq_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with message context.
#[macro_export]
macro_rules! tmq_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__tmq_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__tmq_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}
