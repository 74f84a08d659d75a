//! The client contract shared by every search backend.
//!
//! - [`SearchClient`] - the operations application code calls
//! - [`BackendKind`] - which engine a client talks to
//! - [`RequestContext`] - per-call cancellation and deadline
//! - [`WriteReceipt`] - completion handle returned by mutating calls
//!
//! Application code depends only on `Arc<dyn SearchClient>`; the concrete
//! adapter is chosen at construction time by [`crate::connect`].

mod context;
mod receipt;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientResult;
use crate::query::QueryBuilder;
use crate::types::{
    BulkOperation, BulkResult, Document, IndexOptions, IndexSettings, SearchOptions, SearchResult,
};

pub use context::RequestContext;
pub use receipt::{TaskWaiter, WriteReceipt};

/// Identifies the search engine behind a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Elasticsearch or OpenSearch.
    Elasticsearch,
    /// Meilisearch.
    Meilisearch,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Elasticsearch => write!(f, "elasticsearch"),
            BackendKind::Meilisearch => write!(f, "meilisearch"),
        }
    }
}

/// Backend-agnostic search client.
///
/// Every operation takes a [`RequestContext`] as its first parameter; adapters
/// check it before each network attempt and while waiting, so cancelling the
/// context (or letting its deadline pass) ends the call with
/// [`ClientError::Cancelled`](crate::ClientError::Cancelled) or a timeout.
///
/// Mutating calls return a [`WriteReceipt`]. On engines that apply writes
/// synchronously the receipt is already complete; on task-based engines
/// [`WriteReceipt::wait`] blocks until the engine finished the write.
///
/// # Example
///
/// ```ignore
/// use helios_search::{connect, ClientConfig, QueryBuilder, RequestContext, match_query, range};
///
/// let client = connect(ClientConfig::elasticsearch(Default::default()))?;
/// let ctx = RequestContext::new();
///
/// let query = QueryBuilder::new()
///     .must(match_query("name", "laptop"))
///     .filter(range("price").lte(1000));
/// let result = client.search(&ctx, "products", &query).await?;
/// for hit in &result.hits {
///     println!("{} {:?}", hit.id, hit.score);
/// }
/// ```
#[async_trait]
pub trait SearchClient: Send + Sync + Debug {
    /// Returns the engine this client talks to.
    fn backend(&self) -> BackendKind;

    /// Creates or replaces a document.
    async fn index(
        &self,
        ctx: &RequestContext,
        index: &str,
        id: &str,
        document: &Value,
    ) -> ClientResult<WriteReceipt> {
        self.index_with_options(ctx, index, id, document, &IndexOptions::default())
            .await
    }

    /// Creates or replaces a document with explicit write options.
    ///
    /// An empty `id` lets the engine (or the adapter) assign one.
    async fn index_with_options(
        &self,
        ctx: &RequestContext,
        index: &str,
        id: &str,
        document: &Value,
        options: &IndexOptions,
    ) -> ClientResult<WriteReceipt>;

    /// Fetches a document by id.
    ///
    /// # Errors
    ///
    /// * `ClientError::NotFound` - no document with this id
    /// * `ClientError::IndexNotFound` - the index does not exist
    async fn get(&self, ctx: &RequestContext, index: &str, id: &str) -> ClientResult<Document>;

    /// Deletes a document by id.
    async fn delete(&self, ctx: &RequestContext, index: &str, id: &str)
    -> ClientResult<WriteReceipt>;

    /// Runs a query with default options.
    async fn search(
        &self,
        ctx: &RequestContext,
        index: &str,
        query: &QueryBuilder,
    ) -> ClientResult<SearchResult> {
        self.search_with_options(ctx, index, query, &SearchOptions::default())
            .await
    }

    /// Runs a query with paging, sorting, highlighting, and aggregations.
    async fn search_with_options(
        &self,
        ctx: &RequestContext,
        index: &str,
        query: &QueryBuilder,
        options: &SearchOptions,
    ) -> ClientResult<SearchResult>;

    /// Counts documents matching a query.
    async fn count(&self, ctx: &RequestContext, index: &str, query: &QueryBuilder)
    -> ClientResult<u64>;

    /// Applies a batch of writes.
    ///
    /// Per-item failures are reported in the result, not as an error; the
    /// result has exactly one item per operation, in input order.
    async fn bulk(&self, ctx: &RequestContext, operations: &[BulkOperation])
    -> ClientResult<BulkResult>;

    /// Creates an index.
    async fn create_index(
        &self,
        ctx: &RequestContext,
        index: &str,
        settings: &IndexSettings,
    ) -> ClientResult<WriteReceipt>;

    /// Deletes an index and all its documents.
    async fn delete_index(&self, ctx: &RequestContext, index: &str) -> ClientResult<WriteReceipt>;

    /// Returns whether an index exists.
    async fn index_exists(&self, ctx: &RequestContext, index: &str) -> ClientResult<bool>;

    /// Makes every accepted write on `index` visible to search.
    async fn refresh(&self, ctx: &RequestContext, index: &str) -> ClientResult<()>;

    /// Checks that the engine is reachable and healthy.
    async fn health_check(&self, ctx: &RequestContext) -> ClientResult<()>;

    /// Releases the client. Calls made after `close` fail with a connection error.
    async fn close(&self) -> ClientResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Elasticsearch.to_string(), "elasticsearch");
        assert_eq!(BackendKind::Meilisearch.to_string(), "meilisearch");
    }

    #[test]
    fn test_backend_kind_serde() {
        let kind: BackendKind = serde_json::from_str("\"meilisearch\"").unwrap();
        assert_eq!(kind, BackendKind::Meilisearch);
    }
}
