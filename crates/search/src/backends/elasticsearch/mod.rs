//! Elasticsearch / OpenSearch adapter.
//!
//! The query tree's JSON form is the Elasticsearch query DSL, so translation
//! is close to literal: `QueryBuilder::build_query()` becomes the `query` field
//! and `SearchOptions` map onto the matching body keys.
//!
//! # Requests
//!
//! Every call goes through one pipeline: pick a node round-robin, build the
//! request, send it, and on a transport failure or a 429/502/503/504 retry
//! against the next node after `backoff * attempt`. Engine errors are never
//! retried; they are translated from the `{error:{type,reason}}` body, falling
//! back to the HTTP status.
//!
//! # Writes
//!
//! Writes are applied by the time the call returns, so every
//! [`WriteReceipt`](crate::WriteReceipt) is already complete. Use
//! [`Refresh`](crate::Refresh) or [`SearchClient::refresh`](crate::SearchClient::refresh)
//! for search visibility.
//!
//! # Example
//!
//! ```ignore
//! use helios_search::backends::elasticsearch::ElasticsearchClient;
//! use helios_search::ElasticsearchConfig;
//!
//! let client = ElasticsearchClient::new(ElasticsearchConfig {
//!     nodes: vec!["http://es1:9200".into(), "http://es2:9200".into()],
//!     ..Default::default()
//! })?;
//! ```

mod bulk;
mod client;
mod errors;
mod request;
mod response;

pub use client::ElasticsearchClient;
pub use response::ByQueryResult;
