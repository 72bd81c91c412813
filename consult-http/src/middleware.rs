//! Ordered request pipeline in front of the transport

use crate::errors::TransportError;
use crate::token::TokenStore;
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// One stage of the request pipeline.
///
/// A stage may rewrite the request, call `next.run` zero or more times,
/// and inspect or replace the response.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        request: TransportRequest,
        next: Next<'_>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Remaining stages plus the transport at the end
pub struct Next<'a> {
    transport: &'a dyn HttpTransport,
    stages: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Pass the request to the next stage
    pub async fn run(self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(
                        request,
                        Next {
                            transport: self.transport,
                            stages: rest,
                        },
                    )
                    .await
            }
            None => self.transport.send(request).await,
        }
    }
}

/// Middleware stages run in insertion order, then the transport
#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<dyn HttpTransport>,
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Pipeline with no stages
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn with(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append an already shared stage
    pub fn with_shared(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run a request through every stage
    pub async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        Next {
            transport: self.transport.as_ref(),
            stages: &self.stages,
        }
        .run(request)
        .await
    }
}

/// Adds configured headers the request does not set itself
pub struct DefaultHeaders {
    headers: Vec<(String, String)>,
}

impl DefaultHeaders {
    pub fn new(headers: Vec<(String, String)>) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl Middleware for DefaultHeaders {
    async fn handle(
        &self,
        mut request: TransportRequest,
        next: Next<'_>,
    ) -> Result<TransportResponse, TransportError> {
        for (name, value) in &self.headers {
            request.set_header_if_absent(name, value);
        }
        next.run(request).await
    }
}

/// Attaches `Authorization: Bearer <token>` from the token store.
///
/// The store is read on every pass, so a replay after a refresh carries
/// the new token. An explicit `Authorization` header wins.
pub struct BearerAuth {
    store: Arc<dyn TokenStore>,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn handle(
        &self,
        mut request: TransportRequest,
        next: Next<'_>,
    ) -> Result<TransportResponse, TransportError> {
        if request.header("Authorization").is_none() {
            if let Some(token) = self.store.get() {
                request.set_header("Authorization", token.bearer());
            }
        }
        next.run(request).await
    }
}

/// Logs each exchange with its latency
pub struct RequestTracing;

#[async_trait]
impl Middleware for RequestTracing {
    async fn handle(
        &self,
        request: TransportRequest,
        next: Next<'_>,
    ) -> Result<TransportResponse, TransportError> {
        let method = request.method;
        let url = request.url.clone();
        let started = Instant::now();

        debug!("Sending {} {}", method, url);
        let result = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => info!(
                method = %method,
                url = %url,
                status = response.status,
                elapsed_ms,
                "HTTP exchange completed"
            ),
            Err(error) => info!(
                method = %method,
                url = %url,
                elapsed_ms,
                error = %error,
                "HTTP exchange failed"
            ),
        }

        result
    }
}
