//! Helios Search Client
//!
//! This crate provides one search client interface over several full-text
//! search engines. Application code builds queries with a typed DSL, talks to
//! an `Arc<dyn SearchClient>`, and gets normalized documents, search results,
//! bulk outcomes, and errors back regardless of the engine behind it.
//!
//! # Backends
//!
//! - **Elasticsearch / OpenSearch**: the query tree is sent as the native query
//!   DSL; requests rotate over the configured nodes and are retried on
//!   transport failures and 429/502/503/504.
//! - **Meilisearch**: the query tree is decomposed into a free-text `q` and a
//!   filter expression; writes are engine tasks that can be awaited through a
//!   [`WriteReceipt`].
//!
//! # Architecture
//!
//! - [`query`] - boolean query tree and clause constructors
//! - [`aggregation`] - named aggregation specifications
//! - [`types`] - documents, search options and results, bulk operations
//! - [`core`] - the [`SearchClient`] contract, request contexts, write receipts
//! - [`error`] - the error taxonomy every backend maps onto
//! - [`config`] - backend configuration and [`connect`]
//! - [`transport`] - the HTTP seam and the shared retry policy
//! - [`backends`] - the engine adapters
//!
//! # Quick Start
//!
//! ```no_run
//! use helios_search::{
//!     ClientConfig, MeilisearchConfig, QueryBuilder, RequestContext, connect, match_query, range,
//! };
//! use serde_json::json;
//!
//! # async fn run() -> helios_search::ClientResult<()> {
//! let client = connect(ClientConfig::meilisearch(MeilisearchConfig::default()))?;
//! let ctx = RequestContext::new();
//!
//! client
//!     .index(&ctx, "products", "1", &json!({ "name": "Gaming Laptop", "price": 999 }))
//!     .await?
//!     .wait(&ctx)
//!     .await?;
//!
//! let query = QueryBuilder::new()
//!     .must(match_query("name", "laptop"))
//!     .filter(range("price").lte(1000));
//! let result = client.search(&ctx, "products", &query).await?;
//! println!("{} hits", result.total);
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every failure is a [`ClientError`]; branch on [`ClientError::kind`] rather
//! than on message text:
//!
//! ```
//! use helios_search::{ClientError, ErrorKind};
//!
//! let err = ClientError::NotFound { index: "products".into(), id: "9".into() };
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! assert!(err.is_not_found());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Named aggregation specifications.
pub mod aggregation;
/// Engine adapters.
pub mod backends;
/// Client configuration and construction.
pub mod config;
/// The client contract, request contexts and write receipts.
pub mod core;
/// Error taxonomy.
pub mod error;
/// Query DSL.
pub mod query;
/// HTTP seam and retry policy.
pub mod transport;
/// Request and response types.
pub mod types;

// Re-export commonly used types at crate root
pub use error::{BackendError, ClientError, ClientResult, ErrorKind, TaskError};

pub use core::{BackendKind, RequestContext, SearchClient, TaskWaiter, WriteReceipt};

pub use config::{
    ClientConfig, ElasticsearchAuth, ElasticsearchConfig, MeilisearchConfig, RetryConfig, connect,
    connect_with_sender,
};

pub use backends::elasticsearch::ElasticsearchClient;
pub use backends::meilisearch::MeilisearchClient;

pub use query::{
    Clause, QueryBuilder, exists, function_score, fuzzy, geo_distance, ids, match_all,
    match_phrase, match_query, multi_match, nested, prefix, query_string, range, raw, term, terms,
    wildcard,
};

pub use aggregation::AggregationBuilder;

pub use types::{
    BulkAction, BulkItem, BulkOperation, BulkResult, Document, HighlightOptions, IndexOptions,
    IndexSettings, Refresh, SearchOptions, SearchResult, SortField, SortOrder, TotalRelation,
};

pub use transport::{HttpRequest, HttpResponse, HttpSender, Method, ReqwestSender, TransportError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
