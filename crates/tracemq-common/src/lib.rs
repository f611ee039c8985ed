//! ---
//! tmq_section: "01-core-functionality"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "Shared configuration and logging bootstrap."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
//! Configuration loading and tracing initialisation shared by services that
//! publish or consume through the codec.

pub mod config;
pub mod logging;

pub use config::{AppConfig, LoadedAppConfig, LoggingConfig};
pub use logging::{init_tracing, LogFormat};
