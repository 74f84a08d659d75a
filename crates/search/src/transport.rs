//! HTTP transport seam.
//!
//! Adapters build [`HttpRequest`]s and hand them to an [`HttpSender`]. The
//! default sender is [`ReqwestSender`]; tests swap in a scripted sender.
//! [`send_with_retry`] applies the shared retry policy on top of any sender.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::RetryConfig;
use crate::core::{BackendKind, RequestContext};
use crate::error::{ClientError, ClientResult};

/// HTTP statuses that are retried.
pub const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    /// Headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout; `None` uses the sender's default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// A request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Appends a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body and its content type.
    pub fn json(self, body: &Value) -> ClientResult<Self> {
        let bytes = serde_json::to_vec(body)?;
        Ok(self.body("application/json", bytes))
    }

    /// Sets the body and its content type.
    pub fn body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body);
        self
    }

    /// Overrides the sender's timeout for this request.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The path and query of the URL, for logging.
    pub fn path(&self) -> &str {
        match self.url.find("://") {
            Some(scheme_end) => {
                let rest = &self.url[scheme_end + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
            }
            None => &self.url,
        }
    }

    /// Looks up a header (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses the body as JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with `status` and `body`.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::serialization(format!(
                "failed to decode response (status {}): {}",
                self.status, e
            ))
        })
    }

    /// The body as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A request that never produced a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be opened or was dropped.
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response within the request timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Sends HTTP requests.
///
/// Implementations only move bytes; status handling and retries live above.
#[async_trait]
pub trait HttpSender: Send + Sync + fmt::Debug {
    /// Sends one request and returns whatever status came back.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpSender`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    /// Builds a sender with a default per-request timeout.
    pub fn new(timeout: Duration, disable_certificate_validation: bool) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(disable_certificate_validation)
            .build()
            .map_err(|e| ClientError::Configuration {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

// ============================================================================
// URLs and auth
// ============================================================================

/// Appends percent-encoded path segments and query pairs to `base`.
pub(crate) fn build_url(
    base: &str,
    segments: &[&str],
    query: &[(&str, String)],
) -> ClientResult<String> {
    let mut url = Url::parse(base).map_err(|e| ClientError::Configuration {
        message: format!("invalid URL {:?}: {}", base, e),
    })?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ClientError::Configuration {
                message: format!("URL {:?} cannot carry a path", base),
            })?;
        path.pop_if_empty();
        path.extend(segments);
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.into())
}

/// `Authorization` value for HTTP basic auth.
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", username, password))
    )
}

/// `Authorization` value for an Elasticsearch API key.
///
/// With an id the pair is encoded; without one `key` is taken as already encoded.
pub(crate) fn api_key_auth(id: Option<&str>, key: &str) -> String {
    match id {
        Some(id) => format!("ApiKey {}", STANDARD.encode(format!("{}:{}", id, key))),
        None => format!("ApiKey {}", key),
    }
}

pub(crate) fn bearer_auth(token: &str) -> String {
    format!("Bearer {}", token)
}

// ============================================================================
// Retry
// ============================================================================

/// Sends a request, retrying transport failures and retryable statuses.
///
/// `build` is called once per attempt with the zero-based attempt number so
/// callers can pick a different node each time. Attempts wait
/// `backoff * attempt` before going out. Cancellation is checked before every
/// attempt and during the wait. After `max_retries` retries the last failure
/// is returned as a connection error (or a timeout when the transport timed out).
pub(crate) async fn send_with_retry<F>(
    sender: &dyn HttpSender,
    ctx: &RequestContext,
    retry: &RetryConfig,
    backend: BackendKind,
    mut build: F,
) -> ClientResult<HttpResponse>
where
    F: FnMut(u32) -> ClientResult<HttpRequest>,
{
    let mut attempt: u32 = 0;
    loop {
        ctx.check()?;

        let mut request = build(attempt)?;
        if let Some(remaining) = ctx.remaining() {
            request.timeout = Some(request.timeout.map_or(remaining, |t| t.min(remaining)));
        }
        let method = request.method;
        let url = request.url.clone();

        debug!(
            backend = %backend,
            method = %method,
            url = %url,
            attempt = attempt,
            "Sending request"
        );

        let failure = match ctx.run(sender.send(request)).await? {
            Ok(response) if !RETRYABLE_STATUSES.contains(&response.status) => {
                if attempt > 0 {
                    debug!(backend = %backend, attempts = attempt + 1, "Request succeeded after retries");
                }
                return Ok(response);
            }
            Ok(response) => Failure::Status(response.status, response.text()),
            Err(err) => Failure::Transport(err),
        };

        if attempt >= retry.max_retries {
            warn!(
                backend = %backend,
                method = %method,
                url = %url,
                attempts = attempt + 1,
                error = %failure,
                "Giving up after retries"
            );
            return Err(failure.into_error(backend, attempt + 1));
        }

        attempt += 1;
        let delay = retry.backoff * attempt;
        warn!(
            backend = %backend,
            method = %method,
            url = %url,
            attempt = attempt,
            max_retries = retry.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %failure,
            "Request failed, retrying"
        );
        ctx.sleep(delay).await?;
    }
}

enum Failure {
    Status(u16, String),
    Transport(TransportError),
}

impl Failure {
    fn into_error(self, backend: BackendKind, attempts: u32) -> ClientError {
        match self {
            Failure::Transport(TransportError::Timeout(message)) => ClientError::Timeout {
                message: format!("{} after {} attempts", message, attempts),
            },
            other => ClientError::Connection {
                backend,
                message: format!("{} after {} attempts", other, attempts),
            },
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Status(status, body) if body.is_empty() => write!(f, "status {}", status),
            Failure::Status(status, body) => write!(f, "status {}: {}", status, body),
            Failure::Transport(err) => write!(f, "{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct Scripted {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpSender for Scripted {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    fn scripted(responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Scripted> {
        Arc::new(Scripted {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            backoff: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_build_url_encodes_segments() {
        let url = build_url(
            "http://localhost:9200/",
            &["my index", "_doc", "a/b"],
            &[("refresh", "true".to_string())],
        )
        .unwrap();
        assert_eq!(url, "http://localhost:9200/my%20index/_doc/a%2Fb?refresh=true");
    }

    #[test]
    fn test_build_url_keeps_base_path() {
        let url = build_url("https://search.example.com/es", &["_bulk"], &[]).unwrap();
        assert_eq!(url, "https://search.example.com/es/_bulk");
    }

    #[test]
    fn test_auth_headers() {
        assert_eq!(basic_auth("elastic", "changeme"), "Basic ZWxhc3RpYzpjaGFuZ2VtZQ==");
        assert_eq!(api_key_auth(None, "abc"), "ApiKey abc");
        assert_eq!(api_key_auth(Some("id"), "key"), "ApiKey aWQ6a2V5");
        assert_eq!(bearer_auth("master"), "Bearer master");
    }

    #[test]
    fn test_request_path() {
        let request = HttpRequest::new(Method::Get, "http://localhost:7700/tasks/5?x=1");
        assert_eq!(request.path(), "/tasks/5?x=1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let sender = scripted(vec![
            Ok(HttpResponse::new(503, "")),
            Err(TransportError::Connect("refused".to_string())),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        let mut attempts = Vec::new();
        let response = send_with_retry(
            sender.as_ref(),
            &RequestContext::new(),
            &retry(3),
            BackendKind::Elasticsearch,
            |attempt| {
                attempts.push(attempt);
                Ok(HttpRequest::new(Method::Get, "http://localhost:9200/"))
            },
        )
        .await
        .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(attempts, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_connection_error() {
        let sender = scripted(vec![
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
        ]);
        let err = send_with_retry(
            sender.as_ref(),
            &RequestContext::new(),
            &retry(1),
            BackendKind::Elasticsearch,
            |_| Ok(HttpRequest::new(Method::Get, "http://localhost:9200/")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionError);
        assert_eq!(sender.seen.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_semantic_errors_are_not_retried() {
        let sender = scripted(vec![Ok(HttpResponse::new(400, "{}"))]);
        let response = send_with_retry(
            sender.as_ref(),
            &RequestContext::new(),
            &retry(3),
            BackendKind::Meilisearch,
            |_| Ok(HttpRequest::new(Method::Post, "http://localhost:7700/indexes")),
        )
        .await
        .unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(sender.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_sends_nothing() {
        let sender = scripted(vec![Ok(HttpResponse::new(200, "{}"))]);
        let ctx = RequestContext::new();
        ctx.cancel();
        let err = send_with_retry(
            sender.as_ref(),
            &ctx,
            &retry(3),
            BackendKind::Elasticsearch,
            |_| Ok(HttpRequest::new(Method::Get, "http://localhost:9200/")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert!(sender.seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_timeout_surfaces_as_timeout() {
        let sender = scripted(vec![Err(TransportError::Timeout("slow".to_string()))]);
        let err = send_with_retry(
            sender.as_ref(),
            &RequestContext::new(),
            &retry(0),
            BackendKind::Elasticsearch,
            |_| Ok(HttpRequest::new(Method::Get, "http://localhost:9200/")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
