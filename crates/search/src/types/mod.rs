//! Normalized request and result types shared by every backend.
//!
//! - [`Document`] - one indexed record with raw source bytes
//! - [`SearchOptions`], [`SearchResult`] - search requests and responses
//! - [`BulkOperation`], [`BulkResult`] - batched writes and their outcomes
//! - [`IndexSettings`], [`IndexOptions`] - index lifecycle and write options

mod bulk;
mod document;
mod index;
mod search;

pub use bulk::{BulkAction, BulkItem, BulkOperation, BulkResult};
pub use document::Document;
pub use index::{IndexOptions, IndexSettings, Refresh};
pub use search::{
    HighlightOptions, SearchOptions, SearchResult, SortField, SortOrder, TotalRelation,
};
