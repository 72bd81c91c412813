//! Resilient client session
//!
//! [`ClientSession`] owns one token store, breaker, refresh queue and
//! response cache. Every call goes through the same path: cache lookup,
//! breaker admission, the request pipeline, 401 handling, retries, and a
//! single notification for the final outcome.

use crate::config::ClientConfig;
use crate::errors::{ApiError, ApiResult};
use crate::middleware::{BearerAuth, DefaultHeaders, Middleware, Pipeline, RequestTracing};
use crate::notify::{Notifier, Severity, TracingNotifier};
use crate::refresh::{PipelineRefresher, RefreshCoordinator, TokenRefresher};
use crate::request::{RequestDescriptor, RequestOptions};
use crate::token::{InMemoryTokenStore, TokenStore};
use crate::transport::{
    FileUpload, HttpTransport, ProgressCallback, RequestBody, ReqwestTransport, TransportResponse,
};
use crate::types::HttpMethod;
use bytes::Bytes;
use consult_caching::{HttpCacheKey, ResponseCache};
use consult_config::{CacheConfig, ConsultConfig};
use consult_resilience::{
    CircuitBreaker, CircuitBreakerConfig, RetryError, RetryExecutor, RetryPolicy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct SessionInner {
    config: ClientConfig,
    pipeline: Pipeline,
    tokens: Arc<dyn TokenStore>,
    cache: ResponseCache,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    refresh: RefreshCoordinator,
    notifier: Arc<dyn Notifier>,
    cleanup: Option<JoinHandle<()>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.abort();
        }
    }
}

/// Shared client for the Consult API.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ClientSession {
    inner: Arc<SessionInner>,
}

impl ClientSession {
    pub fn builder() -> ClientSessionBuilder {
        ClientSessionBuilder::new()
    }

    /// Session with the given configuration and default collaborators
    pub fn from_config(config: &ConsultConfig) -> ApiResult<Self> {
        ClientSessionBuilder::from_config(config).build()
    }

    /// GET `path` and decode the response
    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<T> {
        self.request(HttpMethod::Get, path, None, options).await
    }

    /// POST `body` to `path`
    pub async fn post<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Post, path, body, options).await
    }

    /// PUT `body` to `path`
    pub async fn put<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Put, path, body, options).await
    }

    /// PATCH `body` to `path`
    pub async fn patch<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Patch, path, body, options).await
    }

    /// DELETE `path`
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<T> {
        self.request(HttpMethod::Delete, path, None, options).await
    }

    /// Issue a call with an optional JSON body.
    ///
    /// A `null` body is sent as no body at all.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<JsonValue>,
        options: RequestOptions,
    ) -> ApiResult<T> {
        let result = match self.fetch_value(method, path, body, &options).await {
            Ok(value) => serde_json::from_value(value).map_err(ApiError::from),
            Err(error) => Err(error),
        };
        self.finish(method, path, result, &options)
    }

    /// Upload a file as `multipart/form-data` under the field `file`.
    ///
    /// Uses the upload timeout. `on_progress` receives whole percentages as
    /// the body streams. Uploads are not retried unless `options` says so.
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        path: &str,
        file: FileUpload,
        on_progress: Option<ProgressCallback>,
        options: RequestOptions,
    ) -> ApiResult<T> {
        let result: ApiResult<T> = async {
            let url = self.inner.config.resolve_url(path)?;
            let mut descriptor = RequestDescriptor::new(
                HttpMethod::Post,
                url,
                RequestBody::File(file),
                self.inner.config.upload_timeout,
                &options,
            );
            if let Some(on_progress) = on_progress {
                descriptor = descriptor.with_progress(on_progress);
            }

            let response = self.dispatch(&descriptor, &options).await?;
            serde_json::from_value(parse_body(&response.body)).map_err(ApiError::from)
        }
        .await;

        self.finish(HttpMethod::Post, path, result, &options)
    }

    /// Download the raw body of `path` with the download timeout.
    ///
    /// Downloads bypass the response cache.
    pub async fn download(&self, path: &str, options: RequestOptions) -> ApiResult<Bytes> {
        let result: ApiResult<Bytes> = async {
            let url = self.inner.config.resolve_url(path)?;
            let descriptor = RequestDescriptor::new(
                HttpMethod::Get,
                url,
                RequestBody::Empty,
                self.inner.config.download_timeout,
                &options,
            );
            let response = self.dispatch(&descriptor, &options).await?;
            Ok(response.body)
        }
        .await;

        self.finish(HttpMethod::Get, path, result, &options)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.inner.notifier
    }

    /// Drop every cached response
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    async fn send_json<T, B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        match serde_json::to_value(body) {
            Ok(body) => self.request(method, path, Some(body), options).await,
            Err(error) => self.finish(
                method,
                path,
                Err(ApiError::InvalidRequest(format!("Unserializable body: {}", error))),
                &options,
            ),
        }
    }

    async fn fetch_value(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<JsonValue>,
        options: &RequestOptions,
    ) -> ApiResult<JsonValue> {
        let url = self.inner.config.resolve_url(path)?;
        let body = body.filter(|body| !body.is_null());

        let cache_key = (method.is_cacheable() && !options.no_cache && self.inner.cache.is_enabled())
            .then(|| HttpCacheKey::from_parts(method.as_str(), url.as_str(), &options.query, body.as_ref()));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.inner.cache.get(key) {
                debug!("Serving {} {} from cache", method, url);
                return Ok(cached.as_ref().clone());
            }
        }

        let body = match body {
            Some(json) => RequestBody::Json(json),
            None => RequestBody::Empty,
        };
        let descriptor = RequestDescriptor::new(method, url, body, self.inner.config.timeout, options);
        let response = self.dispatch(&descriptor, options).await?;
        let value = parse_body(&response.body);

        if let Some(key) = cache_key {
            self.inner.cache.set(key, value.clone(), options.cache_ttl);
        }

        Ok(value)
    }

    /// Run one logical call behind the breaker with retries.
    ///
    /// Non-idempotent calls get a single attempt.
    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        options: &RequestOptions,
    ) -> ApiResult<TransportResponse> {
        let policy = if descriptor.idempotent {
            self.inner.retry.clone()
        } else {
            self.inner.retry.without_retries()
        };
        let executor = RetryExecutor::new(policy);
        let max_retries = executor.policy().max_attempts;

        let call = executor.execute_with_circuit_breaker(
            |attempt| {
                descriptor.set_retries_left(max_retries.saturating_sub(attempt));
                self.attempt(descriptor)
            },
            &self.inner.breaker,
        );

        let outcome = match &options.cancel_token {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Cancelled {} {}", descriptor.method, descriptor.url);
                        return Err(ApiError::Cancelled);
                    }
                    outcome = call => outcome,
                }
            }
            None => call.await,
        };

        outcome.map_err(|error| match error {
            RetryError::CircuitBreakerOpen => ApiError::CircuitOpen,
            RetryError::MaxAttemptsExceeded { last_error, .. } => last_error,
            RetryError::NonRetryableError(error) => error,
        })
    }

    /// One attempt, including the single replay after a token refresh
    async fn attempt(&self, descriptor: &RequestDescriptor) -> ApiResult<TransportResponse> {
        loop {
            let response = self
                .inner
                .pipeline
                .send(descriptor.to_transport_request())
                .await?;

            if response.is_success() {
                return Ok(response);
            }

            if response.status != 401 || !descriptor.refresh_on_unauthorized {
                return Err(ApiError::from_response(
                    response.status,
                    &response.headers,
                    &response.body,
                ));
            }

            if !descriptor.claim_auth_retry() {
                warn!("Still unauthorized after token refresh: {} {}", descriptor.method, descriptor.url);
                self.expire_session();
                return Err(ApiError::AuthExpired);
            }

            debug!("Unauthorized on {} {}; refreshing token", descriptor.method, descriptor.url);
            if let Err(error) = self.inner.refresh.refresh().await {
                // The coordinator has already cleared tokens and signalled expiry
                self.inner.cache.clear();
                return Err(error);
            }
        }
    }

    /// Forget everything tied to the signed-in user
    fn expire_session(&self) {
        self.inner.tokens.clear();
        self.inner.cache.clear();
        self.inner.notifier.session_expired();
    }

    /// Surface the final outcome once
    fn finish<T>(&self, method: HttpMethod, path: &str, result: ApiResult<T>, options: &RequestOptions) -> ApiResult<T> {
        match &result {
            Ok(_) => {
                if let (false, Some(message)) = (options.silent, &options.success_message) {
                    self.inner.notifier.notify(Severity::Success, message);
                }
            }
            Err(error) => {
                warn!(%error, "{} {} failed", method, path);
                // Session expiry has already been signalled; cancellation is the caller's own doing
                let notify = !options.silent
                    && !matches!(error, ApiError::AuthExpired | ApiError::Cancelled);
                if notify {
                    let severity = match error {
                        ApiError::CircuitOpen | ApiError::RateLimited { .. } => Severity::Warning,
                        _ => Severity::Error,
                    };
                    for message in error.user_messages() {
                        self.inner.notifier.notify(severity, &message);
                    }
                }
            }
        }
        result
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("base_url", &self.inner.config.base_url)
            .field("circuit", &self.inner.breaker.state())
            .finish_non_exhaustive()
    }
}

/// JSON when the body parses, its text otherwise, `null` when empty
fn parse_body(body: &[u8]) -> JsonValue {
    if body.is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(body).into_owned()))
}

/// Builder for [`ClientSession`]
pub struct ClientSessionBuilder {
    config: ClientConfig,
    retry: RetryPolicy,
    breaker: CircuitBreakerConfig,
    cache: CacheConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    tokens: Option<Arc<dyn TokenStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Default for ClientSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSessionBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            transport: None,
            tokens: None,
            notifier: None,
            refresher: None,
            middleware: Vec::new(),
        }
    }

    /// Start from a loaded configuration
    pub fn from_config(config: &ConsultConfig) -> Self {
        Self {
            config: ClientConfig::from(config),
            retry: RetryPolicy::from(&config.retry),
            breaker: CircuitBreakerConfig::from(&config.retry),
            cache: config.cache.clone(),
            ..Self::new()
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Use `transport` instead of a reqwest client
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Obtain tokens from `refresher` instead of the refresh endpoint
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Add a stage after the built-in header and auth stages
    pub fn middleware(mut self, stage: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(stage));
        self
    }

    pub fn build(self) -> ApiResult<ClientSession> {
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(InMemoryTokenStore::new()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));

        let mut pipeline = Pipeline::new(transport)
            .with(DefaultHeaders::new(self.config.default_headers.clone()))
            .with(BearerAuth::new(tokens.clone()));
        for stage in self.middleware {
            pipeline = pipeline.with_shared(stage);
        }
        let pipeline = pipeline.with(RequestTracing);

        let refresher = match self.refresher {
            Some(refresher) => refresher,
            None => {
                let url = self.config.resolve_url(&self.config.refresh_path)?;
                Arc::new(PipelineRefresher::new(
                    pipeline.clone(),
                    url,
                    self.config.timeout,
                    self.config.token_lifetime,
                ))
            }
        };
        let refresh = RefreshCoordinator::new(refresher, tokens.clone(), notifier.clone());

        let cache = ResponseCache::from_config(&self.cache);
        let cleanup = match tokio::runtime::Handle::try_current() {
            Ok(_) if cache.is_enabled() => Some(cache.start_cleanup_task(self.cache.cleanup_interval)),
            _ => None,
        };

        debug!("Built client session for {}", self.config.base_url);

        Ok(ClientSession {
            inner: Arc::new(SessionInner {
                config: self.config,
                pipeline,
                tokens,
                cache,
                breaker: CircuitBreaker::new(self.breaker),
                retry: self.retry,
                refresh,
                notifier,
                cleanup,
            }),
        })
    }
}
