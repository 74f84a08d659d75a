//! Meilisearch adapter.
//!
//! Meilisearch has one free-text query (`q`) and a boolean filter language, so
//! the query tree is decomposed rather than serialized; clauses with no filter
//! equivalent are dropped with a warning, or rejected when the client is
//! configured `strict`. Aggregations, scroll, `search_after`, and `explain`
//! are handled the same way.
//!
//! Every write is an engine task. Mutating calls return a
//! [`WriteReceipt`](crate::WriteReceipt) carrying the task uid; waiting polls
//! `GET /tasks/{uid}` at the configured interval until the task succeeds,
//! fails, or is canceled.
//!
//! Bulk operations are grouped per index and action family, one request per
//! group. By default the adapter waits for each group's task so task failures
//! land on that group's items.

mod bulk;
mod client;
mod errors;
mod filter;
mod response;
mod tasks;

pub use client::MeilisearchClient;
