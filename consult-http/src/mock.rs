//! Scripted transport for offline use and tests
//!
//! Routes match on method plus a URL suffix. A route answers from a
//! script of replies; the last reply repeats once the script runs out.

use crate::errors::TransportError;
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};
use crate::types::HttpMethod;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Handler = Arc<dyn Fn(&TransportRequest) -> MockReply + Send + Sync>;

/// What a mock route answers with
#[derive(Clone)]
pub enum MockReply {
    /// A response with any status
    Response(TransportResponse),
    /// No response at all
    Error(TransportError),
    /// Wait, then answer
    Delayed(Duration, Box<MockReply>),
    /// Decide from the request
    Handler(Handler),
}

impl MockReply {
    /// JSON body with the given status
    pub fn json(status: u16, body: JsonValue) -> Self {
        MockReply::Response(TransportResponse::json(status, &body))
    }

    /// Empty body with the given status
    pub fn status(status: u16) -> Self {
        MockReply::Response(TransportResponse::new(status, ""))
    }

    /// Answer computed from the request
    pub fn from_fn(handler: impl Fn(&TransportRequest) -> MockReply + Send + Sync + 'static) -> Self {
        MockReply::Handler(Arc::new(handler))
    }

    /// Delay this reply
    pub fn after(self, delay: Duration) -> Self {
        MockReply::Delayed(delay, Box::new(self))
    }
}

impl std::fmt::Debug for MockReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MockReply::Response(response) => write!(f, "Response({})", response.status),
            MockReply::Error(error) => write!(f, "Error({})", error),
            MockReply::Delayed(delay, reply) => write!(f, "Delayed({:?}, {:?})", delay, reply),
            MockReply::Handler(_) => write!(f, "Handler"),
        }
    }
}

struct MockRoute {
    method: HttpMethod,
    path: String,
    replies: VecDeque<MockReply>,
}

impl MockRoute {
    fn matches(&self, request: &TransportRequest) -> bool {
        let url = request.url.split('?').next().unwrap_or_default();
        self.method == request.method && url.ends_with(&self.path)
    }

    fn next_reply(&mut self) -> Option<MockReply> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

/// Transport answering from registered routes and recording every request
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<MockRoute>>,
    calls: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `reply` for `method` on URLs ending in `path`
    pub fn on(self, method: HttpMethod, path: &str, reply: MockReply) -> Self {
        self.on_sequence(method, path, vec![reply])
    }

    /// Answer the replies in order, repeating the last one
    pub fn on_sequence(self, method: HttpMethod, path: &str, replies: Vec<MockReply>) -> Self {
        self.add_route(method, path, replies);
        self
    }

    /// Register a route on a shared transport; earlier routes match first
    pub fn add_route(&self, method: HttpMethod, path: &str, replies: Vec<MockReply>) {
        debug!("Added mock route for {} {}", method, path);
        self.routes.lock().push(MockRoute {
            method,
            path: path.to_string(),
            replies: replies.into(),
        });
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().clone()
    }

    /// Requests received for `method` on URLs ending in `path`
    pub fn call_count(&self, method: HttpMethod, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|request| {
                let url = request.url.split('?').next().unwrap_or_default();
                request.method == method && url.ends_with(path)
            })
            .count()
    }

    /// Total requests received
    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    fn reply_for(&self, request: &TransportRequest) -> MockReply {
        let mut routes = self.routes.lock();
        routes
            .iter_mut()
            .find(|route| route.matches(request))
            .and_then(MockRoute::next_reply)
            .unwrap_or_else(|| {
                debug!("No mock route for {} {}", request.method, request.url);
                MockReply::json(
                    404,
                    json!({ "message": format!("No mock route for {} {}", request.method, request.url) }),
                )
            })
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(request.clone());
        let mut reply = self.reply_for(&request);

        loop {
            match reply {
                MockReply::Response(response) => {
                    if let Some(progress) = &request.progress {
                        progress(100);
                    }
                    return Ok(response);
                }
                MockReply::Error(error) => return Err(error),
                MockReply::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                MockReply::Handler(handler) => reply = handler(&request),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> TransportRequest {
        TransportRequest::new(HttpMethod::Get, url, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_sequence_repeats_last_reply() {
        let mock = MockTransport::new().on_sequence(
            HttpMethod::Get,
            "/patient/profile",
            vec![MockReply::status(503), MockReply::json(200, json!({"id": 1}))],
        );

        assert_eq!(mock.send(get("http://api/patient/profile")).await.unwrap().status, 503);
        assert_eq!(mock.send(get("http://api/patient/profile")).await.unwrap().status, 200);
        assert_eq!(mock.send(get("http://api/patient/profile")).await.unwrap().status, 200);
        assert_eq!(mock.call_count(HttpMethod::Get, "/patient/profile"), 3);
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404() {
        let mock = MockTransport::new();
        let response = mock.send(get("http://api/unknown")).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_handler_and_error_replies() {
        let mock = MockTransport::new()
            .on(
                HttpMethod::Get,
                "/auth/validate",
                MockReply::from_fn(|request| match request.header("Authorization") {
                    Some("Bearer good") => MockReply::status(200),
                    _ => MockReply::status(401),
                }),
            )
            .on(HttpMethod::Get, "/offline", MockReply::Error(TransportError::Timeout));

        let mut request = get("http://api/auth/validate");
        assert_eq!(mock.send(request.clone()).await.unwrap().status, 401);
        request.set_header("Authorization", "Bearer good");
        assert_eq!(mock.send(request).await.unwrap().status, 200);

        assert_eq!(
            mock.send(get("http://api/offline")).await.unwrap_err(),
            TransportError::Timeout
        );
    }
}
