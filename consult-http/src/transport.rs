//! Transport boundary and the reqwest-backed implementation

use crate::config::ClientConfig;
use crate::errors::TransportError;
use crate::types::HttpMethod;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Upload progress callback, called with a whole percentage (0-100)
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Size of the chunks an upload body is streamed in
pub const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// A file sent as `multipart/form-data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FileUpload {
    /// Create an upload from in-memory content
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Set the part's content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk
    pub async fn from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, data))
    }
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(JsonValue),
    /// Multipart form with the file under the `file` field
    File(FileUpload),
}

/// Fully resolved request handed to the transport
#[derive(Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
    pub progress: Option<ProgressCallback>,
}

impl TransportRequest {
    /// Create a bodiless request
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout,
            progress: None,
        }
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any value under the same name
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Set a header only if it is not already present
    pub fn set_header_if_absent(&mut self, name: &str, value: &str) {
        if self.header(name).is_none() {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Response as received, whatever the status
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are lower-cased
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response with an empty header map
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// JSON response
    pub fn json(status: u16, body: &JsonValue) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns whatever the server answered.
///
/// Non-2xx statuses are responses, not errors; only failures to get a
/// response at all are `Err`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Transport over a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        debug!(
            "Creating reqwest transport with {}s default timeout",
            config.timeout.as_secs()
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn multipart_form(
        upload: FileUpload,
        progress: Option<ProgressCallback>,
    ) -> Result<reqwest::multipart::Form, TransportError> {
        let total = upload.data.len() as u64;
        let body = reqwest::Body::wrap_stream(progress_stream(upload.data, progress));

        let mut part =
            reqwest::multipart::Part::stream_with_length(body, total).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        }

        Ok(reqwest::multipart::Form::new().part("file", part))
    }
}

/// Split `data` into chunks, reporting monotone whole percentages as each
/// chunk is handed to the connection
fn progress_stream(
    data: Bytes,
    progress: Option<ProgressCallback>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = data.len();

    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < total {
        let end = (offset + UPLOAD_CHUNK_SIZE).min(total);
        chunks.push(data.slice(offset..end));
        offset = end;
    }

    if total == 0 {
        if let Some(callback) = &progress {
            callback(100);
        }
    }

    let mut sent = 0usize;
    let mut last_reported = 0u8;
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        if let Some(callback) = &progress {
            let percent = (sent as u128 * 100 / total as u128).min(100) as u8;
            if percent > last_reported {
                last_reported = percent;
                callback(percent);
            }
        }
        Ok(chunk)
    }))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            query,
            body,
            timeout,
            progress,
        } = request;

        debug!("Building {} request to {}", method, url);
        let mut builder = self
            .client
            .request(reqwest::Method::from(method), &url)
            .timeout(timeout);

        if !query.is_empty() {
            builder = builder.query(&query);
        }

        for (name, value) in &headers {
            let name = HeaderName::from_str(name).map_err(|_| {
                TransportError::InvalidRequest(format!("Invalid header name: {}", name))
            })?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| {
                    TransportError::InvalidRequest(format!("Invalid value for header {}", name.as_str()))
                })?;
            builder = builder.header(name, value);
        }

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(json) => builder.json(&json),
            RequestBody::File(upload) => builder.multipart(Self::multipart_form(upload, progress)?),
        };

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        debug!("HTTP response received: {} ({} bytes)", status, body.len());
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use parking_lot::Mutex;

    async fn drain(data: Bytes, progress: Option<ProgressCallback>) -> Vec<u8> {
        let mut stream = Box::pin(progress_stream(data, progress));
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_progress_is_monotone_and_ends_at_100() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p| sink.lock().push(p));

        let data = Bytes::from(vec![7u8; UPLOAD_CHUNK_SIZE * 3 + 10]);
        let out = drain(data.clone(), Some(callback)).await;

        assert_eq!(out, data.to_vec());
        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 4);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_empty_upload_reports_complete() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p| sink.lock().push(p));

        assert!(drain(Bytes::new(), Some(callback)).await.is_empty());
        assert_eq!(*seen.lock(), vec![100]);
    }

    #[test]
    fn test_header_helpers_are_case_insensitive() {
        let mut request = TransportRequest::new(HttpMethod::Get, "http://x", Duration::from_secs(1));
        request.set_header("Authorization", "Bearer a");
        request.set_header("authorization", "Bearer b");
        request.set_header_if_absent("AUTHORIZATION", "Bearer c");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("Authorization"), Some("Bearer b"));
    }
}
