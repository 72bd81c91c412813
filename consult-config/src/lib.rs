//! Domain-driven configuration management for the Consult API client
//!
//! Configuration is split by functional domain (transport, retry, cache,
//! auth, logging), each with validation, defaults, and environment variable
//! overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    auth::AuthConfig, cache::CacheConfig, http::HttpConfig, logging::LoggingConfig,
    retry::RetryConfig, ConsultConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration_ms;
