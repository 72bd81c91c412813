//! Tracing initialization for the Consult API client
//!
//! Library crates only emit `tracing` events; binaries call one of the
//! initializers here once at startup.

pub mod init;

pub use consult_config::domains::logging::{LogFormat, LogLevel};
pub use consult_config::LoggingConfig;
pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
