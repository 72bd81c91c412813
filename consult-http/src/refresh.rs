//! Single-flight access token refresh

use crate::errors::{ApiError, ApiResult};
use crate::middleware::Pipeline;
use crate::notify::Notifier;
use crate::token::{Token, TokenStore};
use crate::transport::TransportRequest;
use crate::types::HttpMethod;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Obtains a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> ApiResult<Token>;
}

#[derive(Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Refreshes by posting to the refresh endpoint through the request
/// pipeline, so the current token goes along as the credential
pub struct PipelineRefresher {
    pipeline: Pipeline,
    url: String,
    timeout: Duration,
    token_lifetime: Duration,
}

impl PipelineRefresher {
    pub fn new(pipeline: Pipeline, url: impl Into<String>, timeout: Duration, token_lifetime: Duration) -> Self {
        Self {
            pipeline,
            url: url.into(),
            timeout,
            token_lifetime,
        }
    }
}

#[async_trait]
impl TokenRefresher for PipelineRefresher {
    async fn refresh(&self) -> ApiResult<Token> {
        let request = TransportRequest::new(HttpMethod::Post, self.url.clone(), self.timeout);
        let response = self.pipeline.send(request).await?;

        if !response.is_success() {
            return Err(ApiError::from_response(
                response.status,
                &response.headers,
                &response.body,
            ));
        }

        let body: RefreshResponse = serde_json::from_slice(&response.body)?;
        Ok(Token::with_lifetime(body.token, self.token_lifetime))
    }
}

type Waiter = oneshot::Sender<Option<Token>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

struct CoordinatorInner {
    state: Mutex<RefreshState>,
    refresher: Arc<dyn TokenRefresher>,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    refreshes: AtomicU64,
}

impl CoordinatorInner {
    /// Take the queue and release every waiter in arrival order
    fn settle(&self, outcome: Option<Token>) {
        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        debug!("Releasing {} callers queued on token refresh", waiters.len());
        for waiter in waiters {
            // The caller may have been cancelled meanwhile
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Releases the queue if the refresh task is torn down before settling
struct SettleGuard {
    inner: Arc<CoordinatorInner>,
    settled: bool,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Token refresh abandoned before completing");
            self.inner.settle(None);
        }
    }
}

/// Guarantees at most one outstanding refresh.
///
/// Callers arriving while a refresh is running are queued and all receive
/// its outcome. The refresh runs on its own task, so cancelling the caller
/// that started it does not strand the others.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefreshCoordinator {
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                state: Mutex::new(RefreshState::default()),
                refresher,
                store,
                notifier,
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Wait for a fresh token, starting a refresh unless one is running.
    ///
    /// On failure the token store has been cleared and the session-expired
    /// signal sent; the caller gets `AuthExpired`.
    pub async fn refresh(&self) -> ApiResult<Token> {
        let (sender, receiver) = oneshot::channel();

        let start = {
            let mut state = self.inner.state.lock();
            state.waiters.push(sender);
            !std::mem::replace(&mut state.refreshing, true)
        };

        if start {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                let mut guard = SettleGuard {
                    inner: inner.clone(),
                    settled: false,
                };

                inner.refreshes.fetch_add(1, Ordering::Relaxed);
                info!("Refreshing access token");

                let outcome = match inner.refresher.refresh().await {
                    Ok(token) => {
                        inner.store.set(token.clone());
                        info!("Access token refreshed");
                        Some(token)
                    }
                    Err(error) => {
                        warn!(%error, "Token refresh failed; clearing session");
                        inner.store.clear();
                        inner.notifier.session_expired();
                        None
                    }
                };

                guard.settled = true;
                inner.settle(outcome);
            });
        } else {
            debug!("Token refresh in flight; queuing caller");
        }

        match receiver.await {
            Ok(Some(token)) => Ok(token),
            _ => Err(ApiError::AuthExpired),
        }
    }

    /// Whether a refresh is currently running
    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().refreshing
    }

    /// Callers currently waiting on the running refresh
    pub fn queued(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Refreshes started since creation
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::Relaxed)
    }
}
