//! Resilient HTTP client for the Consult healthcare portal
//!
//! [`ClientSession`] wraps a transport with default headers, bearer
//! authentication, single-flight token refresh, retries with backoff, a
//! circuit breaker and a response cache for reads. Failures reach the
//! caller as [`ApiError`] and the user through a [`Notifier`].

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod errors;
pub mod middleware;
pub mod mock;
pub mod notify;
pub mod refresh;
pub mod request;
pub mod token;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use auth::{AuthApi, LoginResponse, Registration};
pub use client::{ClientSession, ClientSessionBuilder};
pub use config::ClientConfig;
pub use errors::{messages, ApiError, ApiResult, FieldError, TransportError};
pub use middleware::{BearerAuth, DefaultHeaders, Middleware, Next, Pipeline, RequestTracing};
pub use mock::{MockReply, MockTransport};
pub use notify::{ChannelNotifier, Notification, Notifier, Severity, TracingNotifier};
pub use refresh::{PipelineRefresher, RefreshCoordinator, TokenRefresher};
pub use request::{RequestDescriptor, RequestOptions};
pub use token::{FileTokenStore, InMemoryTokenStore, Token, TokenStore, TokenStoreError, UserProfile};
pub use transport::{
    FileUpload, HttpTransport, ProgressCallback, RequestBody, ReqwestTransport, TransportRequest,
    TransportResponse, UPLOAD_CHUNK_SIZE,
};
pub use types::{HttpMethod, HttpMethodError};

// Re-export the resilience building blocks a session is configured with
pub use consult_resilience::{CircuitBreakerConfig, CircuitState, RetryPolicy};
