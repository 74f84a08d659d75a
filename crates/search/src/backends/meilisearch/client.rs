//! Meilisearch client.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::backends::{Target, item_status};
use crate::config::MeilisearchConfig;
use crate::core::{BackendKind, RequestContext, SearchClient, TaskWaiter, WriteReceipt};
use crate::error::{ClientError, ClientResult, ErrorKind, TaskError};
use crate::query::QueryBuilder;
use crate::transport::{
    self, HttpRequest, HttpResponse, HttpSender, Method, ReqwestSender, bearer_auth, build_url,
};
use crate::types::{
    BulkItem, BulkOperation, BulkResult, Document, IndexOptions, IndexSettings, SearchOptions,
    SearchResult,
};

use super::bulk::{self, Family, Group};
use super::errors::translate;
use super::filter::{self, Translation};
use super::response;
use super::tasks::{TaskInfo, TaskList};

/// Meilisearch returns 20 hits when no limit is given.
const DEFAULT_LIMIT: usize = 20;

/// Client for a Meilisearch instance.
///
/// Writes are enqueued as engine tasks and return a [`WriteReceipt`] carrying
/// the task uid. The client is cheap to clone and shares one connection pool.
#[derive(Clone)]
pub struct MeilisearchClient {
    inner: Arc<Inner>,
}

/// State shared between the client and the receipts it hands out.
pub(crate) struct Inner {
    pub(super) config: MeilisearchConfig,
    sender: Arc<dyn HttpSender>,
    authorization: Option<String>,
    closed: AtomicBool,
}

impl Debug for MeilisearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeilisearchClient")
            .field("url", &self.inner.config.url)
            .field("primary_key", &self.inner.config.primary_key)
            .field("strict", &self.inner.config.strict)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn ensure_open(&self) -> ClientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Connection {
                backend: BackendKind::Meilisearch,
                message: "client is closed".to_string(),
            });
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ClientResult<HttpResponse> {
        self.ensure_open()?;

        let url = build_url(&self.config.url, path, query)?;
        let body = body.map(serde_json::to_vec).transpose()?;

        transport::send_with_retry(
            self.sender.as_ref(),
            ctx,
            &self.config.retry,
            BackendKind::Meilisearch,
            |_attempt| {
                let mut request =
                    HttpRequest::new(method, url.clone()).header("Accept", "application/json");
                if let Some(ref authorization) = self.authorization {
                    request = request.header("Authorization", authorization.clone());
                }
                if let Some(ref bytes) = body {
                    request = request.body("application/json", bytes.clone());
                }
                Ok(request)
            },
        )
        .await
    }

    pub(super) async fn execute_ok(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
        target: Target<'_>,
    ) -> ClientResult<HttpResponse> {
        let response = self.execute(ctx, method, path, query, body).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(translate(&response, target))
        }
    }
}

impl MeilisearchClient {
    /// Creates a client that talks HTTP through `reqwest`.
    pub fn new(config: MeilisearchConfig) -> ClientResult<Self> {
        let sender = ReqwestSender::new(
            config.request_timeout(),
            config.disable_certificate_validation,
        )?;
        Self::with_sender(config, Arc::new(sender))
    }

    /// Creates a client that sends through `sender`.
    pub fn with_sender(config: MeilisearchConfig, sender: Arc<dyn HttpSender>) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|errors| ClientError::Configuration {
                message: errors.join("; "),
            })?;
        let authorization = config.api_key.as_deref().map(bearer_auth);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                sender,
                authorization,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &MeilisearchConfig {
        &self.inner.config
    }

    /// Polls a task until it succeeds, fails, is canceled, or the task timeout passes.
    pub async fn wait_for_task(&self, ctx: &RequestContext, task_uid: u64) -> ClientResult<()> {
        self.inner.wait_for_task(ctx, task_uid).await
    }

    /// Applies the attribute lists of `settings` to an existing index.
    pub async fn update_settings(
        &self,
        ctx: &RequestContext,
        index: &str,
        settings: &IndexSettings,
    ) -> ClientResult<WriteReceipt> {
        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Patch,
                &["indexes", index, "settings"],
                &[],
                Some(&settings_body(settings)),
                Target::index(index),
            )
            .await?;
        let receipt = self.receipt(&response)?;
        debug!(index = %index, task_uid = ?receipt.task_uid(), "Enqueued settings update");
        Ok(receipt)
    }

    fn receipt(&self, response: &HttpResponse) -> ClientResult<WriteReceipt> {
        let info = TaskInfo::from_response(response)?;
        let waiter: Arc<dyn TaskWaiter> = self.inner.clone();
        Ok(WriteReceipt::task(info.task_uid, waiter))
    }

    /// Warns about a feature Meilisearch cannot express, or rejects it in strict mode.
    fn unsupported(&self, index: &str, feature: &str) -> ClientResult<()> {
        if self.inner.config.strict {
            return Err(ClientError::NotSupported {
                backend: BackendKind::Meilisearch,
                feature: feature.to_string(),
            });
        }
        warn!(index = %index, feature = %feature, "Ignoring feature Meilisearch does not support");
        Ok(())
    }

    fn check_translation(&self, index: &str, translation: &Translation) -> ClientResult<()> {
        for clause in &translation.unsupported {
            self.unsupported(index, &format!("{} clause", clause))?;
        }
        Ok(())
    }

    async fn send_group(
        &self,
        ctx: &RequestContext,
        index: &str,
        family: Family,
        payload: Vec<Value>,
    ) -> ClientResult<()> {
        let (method, path, query) = match family {
            Family::Replace => (
                Method::Post,
                vec!["indexes", index, "documents"],
                vec![("primaryKey", self.inner.config.primary_key.clone())],
            ),
            Family::Update => (
                Method::Put,
                vec!["indexes", index, "documents"],
                vec![("primaryKey", self.inner.config.primary_key.clone())],
            ),
            Family::Delete => (
                Method::Post,
                vec!["indexes", index, "documents", "delete-batch"],
                Vec::new(),
            ),
        };
        let response = self
            .inner
            .execute_ok(
                ctx,
                method,
                &path,
                &query,
                Some(&Value::Array(payload)),
                Target::index(index),
            )
            .await?;
        let receipt = self.receipt(&response)?;
        debug!(
            index = %index,
            family = family.as_str(),
            task_uid = ?receipt.task_uid(),
            "Enqueued bulk group"
        );
        if self.inner.config.wait_for_bulk_tasks {
            receipt.wait(ctx).await?;
        }
        Ok(())
    }
}

/// Builds the `/search` body.
///
/// `track_total_hits` switches to `page`/`hitsPerPage` paging, which makes
/// Meilisearch report an exhaustive `totalHits`, whenever `from` falls on a
/// page boundary.
pub(crate) fn search_body(translation: &Translation, options: &SearchOptions) -> Value {
    let mut body = Map::new();
    body.insert("q".to_string(), json!(translation.q));
    if let Some(ref filter) = translation.filter {
        body.insert("filter".to_string(), json!(filter));
    }

    let limit = options.size.unwrap_or(DEFAULT_LIMIT);
    let offset = options.from.unwrap_or(0);
    let on_page_boundary = if limit == 0 {
        offset == 0
    } else {
        offset % limit == 0
    };
    if options.track_total_hits == Some(true) && on_page_boundary {
        let page = if limit == 0 { 1 } else { offset / limit + 1 };
        body.insert("page".to_string(), json!(page));
        body.insert("hitsPerPage".to_string(), json!(limit));
    } else {
        if let Some(from) = options.from {
            body.insert("offset".to_string(), json!(from));
        }
        if let Some(size) = options.size {
            body.insert("limit".to_string(), json!(size));
        }
    }

    if !options.sort.is_empty() {
        let sort: Vec<String> = options
            .sort
            .iter()
            .map(|s| format!("{}:{}", s.field, s.order.as_str()))
            .collect();
        body.insert("sort".to_string(), json!(sort));
    }
    if !options.source_includes.is_empty() {
        body.insert(
            "attributesToRetrieve".to_string(),
            json!(options.source_includes),
        );
    }
    if let Some(ref highlight) = options.highlight {
        let fields = if highlight.fields.is_empty() {
            vec!["*".to_string()]
        } else {
            highlight.fields.clone()
        };
        body.insert("attributesToHighlight".to_string(), json!(fields));
        if let Some(ref pre) = highlight.pre_tag {
            body.insert("highlightPreTag".to_string(), json!(pre));
        }
        if let Some(ref post) = highlight.post_tag {
            body.insert("highlightPostTag".to_string(), json!(post));
        }
    }
    body.insert("showRankingScore".to_string(), json!(true));
    if let Some(min_score) = options.min_score {
        body.insert("rankingScoreThreshold".to_string(), json!(min_score));
    }
    Value::Object(body)
}

/// Search options with no Meilisearch equivalent.
pub(crate) fn unsupported_options(options: &SearchOptions) -> Vec<&'static str> {
    let mut unsupported = Vec::new();
    if options.aggregations.as_ref().is_some_and(|aggs| !aggs.is_empty()) {
        unsupported.push("aggregations");
    }
    if options.search_after.is_some() {
        unsupported.push("search_after");
    }
    if options.scroll.is_some() {
        unsupported.push("scroll");
    }
    if options.explain {
        unsupported.push("explain");
    }
    unsupported
}

fn settings_body(settings: &IndexSettings) -> Value {
    let mut body = Map::new();
    let lists = [
        ("searchableAttributes", &settings.searchable_attributes),
        ("filterableAttributes", &settings.filterable_attributes),
        ("sortableAttributes", &settings.sortable_attributes),
        ("displayedAttributes", &settings.displayed_attributes),
    ];
    for (key, attributes) in lists {
        if !attributes.is_empty() {
            body.insert(key.to_string(), json!(attributes));
        }
    }
    Value::Object(body)
}

#[derive(Debug, Deserialize)]
struct Health {
    #[serde(default)]
    status: String,
}

#[async_trait]
impl SearchClient for MeilisearchClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Meilisearch
    }

    async fn index_with_options(
        &self,
        ctx: &RequestContext,
        index: &str,
        id: &str,
        document: &Value,
        options: &IndexOptions,
    ) -> ClientResult<WriteReceipt> {
        if options.create_only {
            self.unsupported(index, "create-only writes")?;
        }
        if options.if_seq_no.is_some() || options.if_primary_term.is_some() {
            self.unsupported(index, "optimistic concurrency control")?;
        }
        if options.routing.is_some() {
            self.unsupported(index, "routing")?;
        }

        let Value::Object(document) = document else {
            return Err(ClientError::BadRequest {
                message: "document must be a JSON object".to_string(),
            });
        };
        let mut document = document.clone();
        let primary_key = &self.inner.config.primary_key;
        let id = bulk::ensure_primary_key(&mut document, primary_key, id);
        if !bulk::is_valid_id(&id) {
            return Err(ClientError::BadRequest {
                message: format!("invalid document id {:?}", id),
            });
        }

        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Post,
                &["indexes", index, "documents"],
                &[("primaryKey", primary_key.clone())],
                Some(&json!([document])),
                Target::document(index, &id),
            )
            .await?;
        let receipt = self.receipt(&response)?;
        debug!(index = %index, id = %id, task_uid = ?receipt.task_uid(), "Enqueued document");

        if options.refresh.blocks() {
            receipt.wait(ctx).await?;
            return Ok(WriteReceipt::completed());
        }
        Ok(receipt)
    }

    async fn get(&self, ctx: &RequestContext, index: &str, id: &str) -> ClientResult<Document> {
        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Get,
                &["indexes", index, "documents", id],
                &[],
                None,
                Target::document(index, id),
            )
            .await?;
        Ok(Document::new(index, id, response.body))
    }

    async fn delete(&self, ctx: &RequestContext, index: &str, id: &str) -> ClientResult<WriteReceipt> {
        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Delete,
                &["indexes", index, "documents", id],
                &[],
                None,
                Target::document(index, id),
            )
            .await?;
        let receipt = self.receipt(&response)?;
        debug!(index = %index, id = %id, task_uid = ?receipt.task_uid(), "Enqueued document deletion");
        Ok(receipt)
    }

    async fn search_with_options(
        &self,
        ctx: &RequestContext,
        index: &str,
        query: &QueryBuilder,
        options: &SearchOptions,
    ) -> ClientResult<SearchResult> {
        let translation = filter::translate(query, &self.inner.config.primary_key);
        self.check_translation(index, &translation)?;
        for option in unsupported_options(options) {
            self.unsupported(index, option)?;
        }

        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Post,
                &["indexes", index, "search"],
                &[],
                Some(&search_body(&translation, options)),
                Target::index(index),
            )
            .await?;
        let result = response::parse_search(
            &response.body,
            index,
            &self.inner.config.primary_key,
            options,
        )?;
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
        let translation = filter::translate(query, &self.inner.config.primary_key);
        self.check_translation(index, &translation)?;

        let mut body = json!({ "q": translation.q, "limit": 0 });
        if let Some(filter) = translation.filter {
            body["filter"] = json!(filter);
        }
        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Post,
                &["indexes", index, "search"],
                &[],
                Some(&body),
                Target::index(index),
            )
            .await?;
        let (total, _) = response::parse_total(&response.body)?;
        Ok(total)
    }

    async fn bulk(&self, ctx: &RequestContext, operations: &[BulkOperation]) -> ClientResult<BulkResult> {
        let started = Instant::now();
        let plan = bulk::plan(operations, &self.inner.config.primary_key);
        let groups = plan.groups.len();
        let mut items = plan.rejected;
        let success_status = if self.inner.config.wait_for_bulk_tasks {
            200
        } else {
            202
        };

        // Set once a group fails at the call level; later groups are not sent.
        let mut aborted: Option<(u16, String)> = None;
        for group in plan.groups {
            let Group {
                index,
                family,
                members,
                payload,
            } = group;
            let failure = match aborted {
                Some((status, ref message)) => Some((status, format!("not sent: {}", message))),
                None => match self.send_group(ctx, index, family, payload).await {
                    Ok(()) => None,
                    Err(err) => {
                        let failure = (item_status(&err), err.to_string());
                        if matches!(
                            err,
                            ClientError::Cancelled
                                | ClientError::Timeout { .. }
                                | ClientError::Connection { .. }
                        ) {
                            warn!(
                                index = %index,
                                family = family.as_str(),
                                error = %err,
                                "Bulk aborted; remaining groups not sent"
                            );
                            aborted = Some(failure.clone());
                        }
                        Some(failure)
                    }
                },
            };
            for (position, id) in members {
                let op = &operations[position];
                items[position] = Some(match failure {
                    None => BulkItem::success(op, id, success_status),
                    Some((status, ref message)) => BulkItem {
                        id,
                        ..BulkItem::failure(op, status, message.clone())
                    },
                });
            }
        }

        let items: Vec<BulkItem> = items.into_iter().flatten().collect();
        let result = BulkResult::from_items(items, started.elapsed().as_millis() as u64);
        if result.has_errors() {
            warn!(
                operations = operations.len(),
                groups = groups,
                errors = result.error_count,
                "Bulk request finished with item failures"
            );
        } else {
            debug!(operations = operations.len(), groups = groups, "Bulk request finished");
        }
        Ok(result)
    }

    async fn create_index(
        &self,
        ctx: &RequestContext,
        index: &str,
        settings: &IndexSettings,
    ) -> ClientResult<WriteReceipt> {
        let primary_key = settings
            .primary_key
            .clone()
            .unwrap_or_else(|| self.inner.config.primary_key.clone());
        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Post,
                &["indexes"],
                &[],
                Some(&json!({ "uid": index, "primaryKey": primary_key })),
                Target::index(index),
            )
            .await?;
        self.receipt(&response)?
            .wait(ctx)
            .await
            .map_err(|err| match err {
                ClientError::Task(TaskError::Failed {
                    kind: ErrorKind::Conflict,
                    message,
                    ..
                }) => ClientError::Conflict { message },
                other => other,
            })?;
        info!(index = %index, primary_key = %primary_key, "Created index");

        if settings.has_attribute_settings() {
            return self.update_settings(ctx, index, settings).await;
        }
        Ok(WriteReceipt::completed())
    }

    async fn delete_index(&self, ctx: &RequestContext, index: &str) -> ClientResult<WriteReceipt> {
        let response = self
            .inner
            .execute_ok(
                ctx,
                Method::Delete,
                &["indexes", index],
                &[],
                None,
                Target::index(index),
            )
            .await?;
        let receipt = self.receipt(&response)?;
        info!(index = %index, task_uid = ?receipt.task_uid(), "Enqueued index deletion");
        Ok(receipt)
    }

    async fn index_exists(&self, ctx: &RequestContext, index: &str) -> ClientResult<bool> {
        let response = self
            .inner
            .execute(ctx, Method::Get, &["indexes", index], &[], None)
            .await?;
        match response.status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(translate(&response, Target::index(index))),
        }
    }

    async fn refresh(&self, ctx: &RequestContext, index: &str) -> ClientResult<()> {
        let mut pending = Vec::new();
        let mut from: Option<u64> = None;
        loop {
            let mut query = vec![
                ("indexUids", index.to_string()),
                ("statuses", "enqueued,processing".to_string()),
            ];
            if let Some(from) = from {
                query.push(("from", from.to_string()));
            }
            let response = self
                .inner
                .execute_ok(ctx, Method::Get, &["tasks"], &query, None, Target::index(index))
                .await?;
            let list: TaskList = response.json()?;
            pending.extend(list.results.iter().map(|task| task.uid));
            match list.next {
                Some(next) => from = Some(next),
                None => break,
            }
        }

        debug!(index = %index, pending = pending.len(), "Waiting for pending tasks");
        for task_uid in pending {
            self.inner.wait_for_task(ctx, task_uid).await?;
        }
        Ok(())
    }

    async fn health_check(&self, ctx: &RequestContext) -> ClientResult<()> {
        let response = self
            .inner
            .execute_ok(ctx, Method::Get, &["health"], &[], None, Target::none())
            .await?;
        let health: Health = response.json()?;
        if health.status != "available" {
            return Err(ClientError::Connection {
                backend: BackendKind::Meilisearch,
                message: format!("instance status is {:?}", health.status),
            });
        }
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}
