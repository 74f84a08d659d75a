//! Elasticsearch client.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::backends::Target;
use crate::config::{ElasticsearchAuth, ElasticsearchConfig};
use crate::core::{BackendKind, RequestContext, SearchClient, WriteReceipt};
use crate::error::{ClientError, ClientResult};
use crate::query::QueryBuilder;
use crate::transport::{
    self, HttpRequest, HttpResponse, HttpSender, Method, ReqwestSender, api_key_auth, basic_auth,
    build_url,
};
use crate::types::{
    BulkOperation, BulkResult, Document, IndexOptions, IndexSettings, SearchOptions, SearchResult,
};

use super::bulk;
use super::errors::translate;
use super::request;
use super::response::{self, ByQueryResult};

/// Request body variants.
enum Body {
    Json(Value),
    NdJson(Vec<u8>),
}

/// Client for Elasticsearch and OpenSearch clusters.
///
/// Requests rotate over the configured nodes; each retry goes to the next
/// node. The client is `Send + Sync` and meant to be shared behind an `Arc`.
pub struct ElasticsearchClient {
    config: ElasticsearchConfig,
    sender: Arc<dyn HttpSender>,
    authorization: Option<String>,
    cursor: AtomicUsize,
    closed: AtomicBool,
}

impl Debug for ElasticsearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchClient")
            .field("nodes", &self.config.nodes)
            .field("retry", &self.config.retry)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ElasticsearchClient {
    /// Creates a client that talks HTTP through `reqwest`.
    pub fn new(config: ElasticsearchConfig) -> ClientResult<Self> {
        let sender = ReqwestSender::new(
            config.request_timeout(),
            config.disable_certificate_validation,
        )?;
        Self::with_sender(config, Arc::new(sender))
    }

    /// Creates a client that sends through `sender`.
    pub fn with_sender(
        config: ElasticsearchConfig,
        sender: Arc<dyn HttpSender>,
    ) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|errors| ClientError::Configuration {
                message: errors.join("; "),
            })?;

        let authorization = config.auth.as_ref().map(|auth| match auth {
            ElasticsearchAuth::Basic { username, password } => basic_auth(username, password),
            ElasticsearchAuth::ApiKey { id, key } => api_key_auth(id.as_deref(), key),
        });

        Ok(Self {
            config,
            sender,
            authorization,
            cursor: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    /// Picks the next node round-robin.
    fn next_node(&self) -> &str {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.config.nodes[position % self.config.nodes.len()]
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Connection {
                backend: BackendKind::Elasticsearch,
                message: "client is closed".to_string(),
            });
        }
        Ok(())
    }

    /// Sends one logical request through the retry pipeline.
    async fn execute(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        body: Option<Body>,
    ) -> ClientResult<HttpResponse> {
        self.ensure_open()?;

        let body = match body {
            Some(Body::Json(value)) => Some(("application/json", serde_json::to_vec(&value)?)),
            Some(Body::NdJson(bytes)) => Some(("application/x-ndjson", bytes)),
            None => None,
        };

        transport::send_with_retry(
            self.sender.as_ref(),
            ctx,
            &self.config.retry,
            BackendKind::Elasticsearch,
            |_attempt| {
                let url = build_url(self.next_node(), path, query)?;
                let mut request = HttpRequest::new(method, url).header("Accept", "application/json");
                if let Some(ref authorization) = self.authorization {
                    request = request.header("Authorization", authorization.clone());
                }
                if let Some((content_type, bytes)) = &body {
                    request = request.body(content_type, bytes.clone());
                }
                Ok(request)
            },
        )
        .await
    }

    /// Sends a request and translates any non-success status.
    async fn execute_ok(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        body: Option<Body>,
        target: Target<'_>,
    ) -> ClientResult<HttpResponse> {
        let response = self.execute(ctx, method, path, query, body).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(translate(&response, target))
        }
    }

    /// Applies a partial update to an existing document.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        index: &str,
        id: &str,
        partial: &Value,
        options: &IndexOptions,
    ) -> ClientResult<WriteReceipt> {
        let query = write_params(options);
        self.execute_ok(
            ctx,
            Method::Post,
            &[index, "_update", id],
            &query,
            Some(Body::Json(json!({ "doc": partial }))),
            Target::document(index, id),
        )
        .await?;
        debug!(index = %index, id = %id, "Updated document");
        Ok(WriteReceipt::completed())
    }

    /// Updates every document matching `query`, optionally running a script.
    ///
    /// A string `script` is taken as painless source; an object is sent as-is.
    pub async fn update_by_query(
        &self,
        ctx: &RequestContext,
        index: &str,
        query: &QueryBuilder,
        script: Option<&Value>,
    ) -> ClientResult<ByQueryResult> {
        let response = self
            .execute_ok(
                ctx,
                Method::Post,
                &[index, "_update_by_query"],
                &[("conflicts", "proceed".to_string())],
                Some(Body::Json(request::update_by_query_body(query, script))),
                Target::index(index),
            )
            .await?;
        let result = response::parse_by_query(&response.body)?;
        info!(index = %index, updated = result.updated, total = result.total, "Update by query finished");
        Ok(result)
    }

    /// Deletes every document matching `query`.
    pub async fn delete_by_query(
        &self,
        ctx: &RequestContext,
        index: &str,
        query: &QueryBuilder,
    ) -> ClientResult<ByQueryResult> {
        let response = self
            .execute_ok(
                ctx,
                Method::Post,
                &[index, "_delete_by_query"],
                &[("conflicts", "proceed".to_string())],
                Some(Body::Json(json!({ "query": query.build_query() }))),
                Target::index(index),
            )
            .await?;
        let result = response::parse_by_query(&response.body)?;
        info!(index = %index, deleted = result.deleted, total = result.total, "Delete by query finished");
        Ok(result)
    }

    /// Fetches the next page of a scroll started with `SearchOptions::scroll`.
    pub async fn scroll(
        &self,
        ctx: &RequestContext,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> ClientResult<SearchResult> {
        let body = json!({
            "scroll": request::time_value(keep_alive),
            "scroll_id": scroll_id,
        });
        let response = self
            .execute_ok(
                ctx,
                Method::Post,
                &["_search", "scroll"],
                &[],
                Some(Body::Json(body)),
                Target::none(),
            )
            .await?;
        response::parse_search(&response.body)
    }

    /// Releases scroll contexts.
    pub async fn clear_scroll(&self, ctx: &RequestContext, scroll_ids: &[String]) -> ClientResult<()> {
        if scroll_ids.is_empty() {
            return Ok(());
        }
        let response = self
            .execute(
                ctx,
                Method::Delete,
                &["_search", "scroll"],
                &[],
                Some(Body::Json(json!({ "scroll_id": scroll_ids }))),
            )
            .await?;
        // Already-expired scrolls answer 404
        if response.is_success() || response.status == 404 {
            Ok(())
        } else {
            Err(translate(&response, Target::none()))
        }
    }
}

fn write_params(options: &IndexOptions) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if options.refresh.blocks() {
        params.push(("refresh", options.refresh.as_str().to_string()));
    }
    if let Some(ref routing) = options.routing {
        params.push(("routing", routing.clone()));
    }
    if let Some(seq_no) = options.if_seq_no {
        params.push(("if_seq_no", seq_no.to_string()));
    }
    if let Some(primary_term) = options.if_primary_term {
        params.push(("if_primary_term", primary_term.to_string()));
    }
    params
}

#[async_trait]
impl SearchClient for ElasticsearchClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Elasticsearch
    }

    async fn index_with_options(
        &self,
        ctx: &RequestContext,
        index: &str,
        id: &str,
        document: &Value,
        options: &IndexOptions,
    ) -> ClientResult<WriteReceipt> {
        let mut query = write_params(options);
        if options.create_only {
            query.push(("op_type", "create".to_string()));
        }
        let (method, path): (Method, Vec<&str>) = if id.is_empty() {
            (Method::Post, vec![index, "_doc"])
        } else {
            (Method::Put, vec![index, "_doc", id])
        };

        self.execute_ok(
            ctx,
            method,
            &path,
            &query,
            Some(Body::Json(document.clone())),
            Target::document(index, id),
        )
        .await?;
        debug!(index = %index, id = %id, refresh = options.refresh.as_str(), "Indexed document");
        Ok(WriteReceipt::completed())
    }

    async fn get(&self, ctx: &RequestContext, index: &str, id: &str) -> ClientResult<Document> {
        let response = self
            .execute(ctx, Method::Get, &[index, "_doc", id], &[], None)
            .await?;
        let target = Target::document(index, id);
        if !response.is_success() {
            return Err(translate(&response, target));
        }
        response::parse_get(&response.body)?.ok_or_else(|| ClientError::NotFound {
            index: index.to_string(),
            id: id.to_string(),
        })
    }

    async fn delete(&self, ctx: &RequestContext, index: &str, id: &str) -> ClientResult<WriteReceipt> {
        self.execute_ok(
            ctx,
            Method::Delete,
            &[index, "_doc", id],
            &[],
            None,
            Target::document(index, id),
        )
        .await?;
        debug!(index = %index, id = %id, "Deleted document");
        Ok(WriteReceipt::completed())
    }

    async fn search_with_options(
        &self,
        ctx: &RequestContext,
        index: &str,
        query: &QueryBuilder,
        options: &SearchOptions,
    ) -> ClientResult<SearchResult> {
        let body = request::search_body(query, options);
        let params: Vec<(&str, String)> = options
            .scroll
            .map(|keep_alive| vec![("scroll", request::time_value(keep_alive))])
            .unwrap_or_default();

        let response = self
            .execute_ok(
                ctx,
                Method::Post,
                &[index, "_search"],
                &params,
                Some(Body::Json(body)),
                Target::index(index),
            )
            .await?;
        let result = response::parse_search(&response.body)?;
        debug!(
            index = %index,
            total = result.total,
            hits = result.hits.len(),
            took_ms = result.took_ms,
            "Search finished"
        );
        Ok(result)
    }

    async fn count(&self, ctx: &RequestContext, index: &str, query: &QueryBuilder) -> ClientResult<u64> {
        let response = self
            .execute_ok(
                ctx,
                Method::Post,
                &[index, "_count"],
                &[],
                Some(Body::Json(json!({ "query": query.build_query() }))),
                Target::index(index),
            )
            .await?;
        response::parse_count(&response.body)
    }

    async fn bulk(&self, ctx: &RequestContext, operations: &[BulkOperation]) -> ClientResult<BulkResult> {
        let started = Instant::now();
        let mut encoded = bulk::encode(operations)?;
        if encoded.is_empty() {
            let items = encoded
                .rejected
                .into_iter()
                .flatten()
                .collect::<Vec<_>>();
            return Ok(BulkResult::from_items(items, started.elapsed().as_millis() as u64));
        }

        let sent = encoded.sent.len();
        let response = self
            .execute_ok(
                ctx,
                Method::Post,
                &["_bulk"],
                &[],
                Some(Body::NdJson(std::mem::take(&mut encoded.body))),
                Target::none(),
            )
            .await?;
        let (items, took) = bulk::reconcile(operations, encoded, &response.body)?;
        let result = BulkResult::from_items(items, took);
        if result.has_errors() {
            warn!(
                operations = operations.len(),
                sent = sent,
                errors = result.error_count,
                "Bulk request finished with item failures"
            );
        } else {
            debug!(operations = operations.len(), took_ms = took, "Bulk request finished");
        }
        Ok(result)
    }

    async fn create_index(
        &self,
        ctx: &RequestContext,
        index: &str,
        settings: &IndexSettings,
    ) -> ClientResult<WriteReceipt> {
        self.execute_ok(
            ctx,
            Method::Put,
            &[index],
            &[],
            Some(Body::Json(request::create_index_body(settings))),
            Target::index(index),
        )
        .await?;
        info!(index = %index, "Created index");
        Ok(WriteReceipt::completed())
    }

    async fn delete_index(&self, ctx: &RequestContext, index: &str) -> ClientResult<WriteReceipt> {
        self.execute_ok(ctx, Method::Delete, &[index], &[], None, Target::index(index))
            .await?;
        info!(index = %index, "Deleted index");
        Ok(WriteReceipt::completed())
    }

    async fn index_exists(&self, ctx: &RequestContext, index: &str) -> ClientResult<bool> {
        let response = self.execute(ctx, Method::Head, &[index], &[], None).await?;
        match response.status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(translate(&response, Target::index(index))),
        }
    }

    async fn refresh(&self, ctx: &RequestContext, index: &str) -> ClientResult<()> {
        self.execute_ok(
            ctx,
            Method::Post,
            &[index, "_refresh"],
            &[],
            None,
            Target::index(index),
        )
        .await?;
        Ok(())
    }

    async fn health_check(&self, ctx: &RequestContext) -> ClientResult<()> {
        let response = self
            .execute_ok(
                ctx,
                Method::Get,
                &["_cluster", "health"],
                &[],
                None,
                Target::none(),
            )
            .await?;
        let (cluster_name, status) = response::parse_health(&response.body)?;
        if status == "red" {
            return Err(ClientError::Connection {
                backend: BackendKind::Elasticsearch,
                message: format!(
                    "cluster {} status is red",
                    cluster_name.as_deref().unwrap_or("<unnamed>")
                ),
            });
        }
        debug!(cluster = ?cluster_name, status = %status, "Cluster health checked");
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
