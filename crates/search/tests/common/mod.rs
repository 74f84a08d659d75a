//! Shared test infrastructure: a recording mock `HttpSender` and client builders.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use helios_search::{
    ElasticsearchClient, ElasticsearchConfig, HttpRequest, HttpResponse, HttpSender,
    MeilisearchClient, MeilisearchConfig, RetryConfig, TransportError,
};

pub type Reply = Result<HttpResponse, TransportError>;

type Handler = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

/// Answers requests through a handler and records every request it saw.
pub struct MockSender {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
}

impl std::fmt::Debug for MockSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSender")
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

impl MockSender {
    pub fn new(handler: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// `METHOD /path?query` of every request, in send order.
    pub fn lines(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|request| format!("{} {}", request.method, request.path()))
            .collect()
    }
}

#[async_trait]
impl HttpSender for MockSender {
    async fn send(&self, request: HttpRequest) -> Reply {
        let reply = (self.handler)(&request);
        self.requests.lock().push(request);
        reply
    }
}

pub fn json_reply(status: u16, body: Value) -> Reply {
    Ok(HttpResponse::new(status, serde_json::to_vec(&body).unwrap()))
}

pub fn raw_reply(status: u16, body: impl Into<Vec<u8>>) -> Reply {
    Ok(HttpResponse::new(status, body))
}

/// Path of a request without its query string.
pub fn route(request: &HttpRequest) -> &str {
    let path = request.path();
    path.split('?').next().unwrap_or(path)
}

pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        backoff: Duration::from_millis(1),
    }
}

pub fn es_client(nodes: &[&str], sender: Arc<MockSender>) -> ElasticsearchClient {
    let config = ElasticsearchConfig {
        nodes: nodes.iter().map(|node| node.to_string()).collect(),
        retry: fast_retry(2),
        ..Default::default()
    };
    ElasticsearchClient::with_sender(config, sender).unwrap()
}

pub fn meili_config() -> MeilisearchConfig {
    MeilisearchConfig {
        url: "http://meili:7700".to_string(),
        api_key: Some("masterKey".to_string()),
        poll_interval: Duration::from_millis(1),
        retry: fast_retry(1),
        ..Default::default()
    }
}

pub fn meili_client(config: MeilisearchConfig, sender: Arc<MockSender>) -> MeilisearchClient {
    MeilisearchClient::with_sender(config, sender).unwrap()
}

/// The `202 Accepted` body Meilisearch returns for an enqueued task.
pub fn enqueued(task_uid: u64, index: &str) -> Reply {
    json_reply(
        202,
        serde_json::json!({
            "taskUid": task_uid,
            "indexUid": index,
            "status": "enqueued",
            "type": "documentAdditionOrUpdate",
            "enqueuedAt": "2024-05-01T10:00:00.000000Z"
        }),
    )
}

pub fn task(task_uid: u64, status: &str) -> Reply {
    json_reply(200, serde_json::json!({ "uid": task_uid, "status": status }))
}

pub fn failed_task(task_uid: u64, code: &str, message: &str) -> Reply {
    json_reply(
        200,
        serde_json::json!({
            "uid": task_uid,
            "status": "failed",
            "error": {
                "message": message,
                "code": code,
                "type": "invalid_request",
                "link": format!("https://docs.meilisearch.com/errors#{}", code)
            }
        }),
    )
}
