//! Per-call options and the request descriptor built from them

use crate::transport::{ProgressCallback, RequestBody, TransportRequest};
use crate::types::HttpMethod;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for a single call
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters
    pub query: Vec<(String, String)>,

    /// Extra headers; these win over the configured defaults
    pub headers: Vec<(String, String)>,

    /// Whether the call may be retried; defaults to the method's idempotency
    pub idempotent: Option<bool>,

    /// Bypass the response cache for this call
    pub no_cache: bool,

    /// Cache lifetime for this response instead of the configured default
    pub cache_ttl: Option<Duration>,

    /// Do not send failure or success notifications
    pub silent: bool,

    /// Message to notify when the call succeeds
    pub success_message: Option<String>,

    /// Timeout for this call instead of the configured one
    pub timeout: Option<Duration>,

    /// Do not attempt a token refresh on 401
    pub skip_auth_refresh: bool,

    /// Cancels the call when triggered
    pub cancel_token: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Mark the call as safe (or unsafe) to repeat
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    /// Skip the response cache
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Cache the response for `ttl`
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Suppress notifications
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Notify `message` on success
    pub fn success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Override the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Treat a 401 as final
    pub fn skip_auth_refresh(mut self) -> Self {
        self.skip_auth_refresh = true;
        self
    }

    /// Attach a cancellation token
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Everything needed to (re)send one logical call.
///
/// Fixed once built, apart from the retry and auth-replay bookkeeping.
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
    pub idempotent: bool,
    pub refresh_on_unauthorized: bool,
    pub progress: Option<ProgressCallback>,
    retries_left: AtomicU32,
    auth_retried: AtomicBool,
}

impl RequestDescriptor {
    pub fn new(
        method: HttpMethod,
        url: impl Into<String>,
        body: RequestBody,
        timeout: Duration,
        options: &RequestOptions,
    ) -> Self {
        Self {
            method,
            url: url.into(),
            headers: options.headers.clone(),
            query: options.query.clone(),
            body,
            timeout: options.timeout.unwrap_or(timeout),
            idempotent: options.idempotent.unwrap_or_else(|| method.is_idempotent()),
            refresh_on_unauthorized: !options.skip_auth_refresh,
            progress: None,
            retries_left: AtomicU32::new(0),
            auth_retried: AtomicBool::new(false),
        }
    }

    /// Report upload progress through `callback`
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Transport request for one attempt
    pub fn to_transport_request(&self) -> TransportRequest {
        TransportRequest {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
            progress: self.progress.clone(),
        }
    }

    /// Retries still allowed
    pub fn retries_left(&self) -> u32 {
        self.retries_left.load(Ordering::Relaxed)
    }

    pub(crate) fn set_retries_left(&self, retries: u32) {
        self.retries_left.store(retries, Ordering::Relaxed);
    }

    /// Whether a 401 already caused a replay
    pub fn auth_retried(&self) -> bool {
        self.auth_retried.load(Ordering::SeqCst)
    }

    /// Claim the single 401 replay; `false` if it was already used
    pub(crate) fn claim_auth_retry(&self) -> bool {
        !self.auth_retried.swap(true, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .field("idempotent", &self.idempotent)
            .field("retries_left", &self.retries_left())
            .field("auth_retried", &self.auth_retried())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_defaults_to_method() {
        let options = RequestOptions::new();
        let timeout = Duration::from_secs(5);

        let get = RequestDescriptor::new(HttpMethod::Get, "/x", RequestBody::Empty, timeout, &options);
        let post = RequestDescriptor::new(HttpMethod::Post, "/x", RequestBody::Empty, timeout, &options);
        assert!(get.idempotent);
        assert!(!post.idempotent);

        let opted_in = RequestDescriptor::new(
            HttpMethod::Put,
            "/x",
            RequestBody::Empty,
            timeout,
            &RequestOptions::new().idempotent(true),
        );
        assert!(opted_in.idempotent);
    }

    #[test]
    fn test_auth_retry_claimed_once() {
        let descriptor = RequestDescriptor::new(
            HttpMethod::Get,
            "/x",
            RequestBody::Empty,
            Duration::from_secs(1),
            &RequestOptions::new(),
        );

        assert!(!descriptor.auth_retried());
        assert!(descriptor.claim_auth_retry());
        assert!(!descriptor.claim_auth_retry());
        assert!(descriptor.auth_retried());
    }

    #[test]
    fn test_options_flow_into_transport_request() {
        let options = RequestOptions::new()
            .query("page", 2)
            .header("X-Trace", "abc")
            .timeout(Duration::from_millis(250))
            .skip_auth_refresh();
        let descriptor = RequestDescriptor::new(
            HttpMethod::Get,
            "http://api.test/doctors",
            RequestBody::Empty,
            Duration::from_secs(30),
            &options,
        );

        assert!(!descriptor.refresh_on_unauthorized);
        let request = descriptor.to_transport_request();
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(request.header("x-trace"), Some("abc"));
        assert_eq!(request.timeout, Duration::from_millis(250));
    }
}
