//! Search request options and normalized search results.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregation::AggregationBuilder;
use crate::error::ClientResult;

use super::Document;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// `asc` or `desc`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// Field to sort on.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

impl SortField {
    /// Ascending on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    /// Parses `"field"`, `"-field"`, `"field:asc"`, or `"field:desc"`.
    pub fn parse(spec: &str) -> Self {
        if let Some(field) = spec.strip_prefix('-') {
            return Self::desc(field);
        }
        match spec.rsplit_once(':') {
            Some((field, "desc")) => Self::desc(field),
            Some((field, "asc")) => Self::asc(field),
            _ => Self::asc(spec),
        }
    }
}

/// Highlighting request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightOptions {
    /// Fields to highlight.
    pub fields: Vec<String>,
    /// Markup inserted before a match.
    pub pre_tag: Option<String>,
    /// Markup inserted after a match.
    pub post_tag: Option<String>,
    /// Fragment length in characters (Elasticsearch).
    pub fragment_size: Option<u32>,
    /// Fragments per field (Elasticsearch).
    pub number_of_fragments: Option<u32>,
}

impl HighlightOptions {
    /// Highlights `fields` with the engine's default tags.
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Sets the markup around matches.
    pub fn tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.pre_tag = Some(pre.into());
        self.post_tag = Some(post.into());
        self
    }
}

/// Options for `search_with_options`.
///
/// Backends honor what they can express and ignore the rest; see each
/// adapter's documentation for the mapping.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Hits to skip.
    pub from: Option<usize>,
    /// Hits to return.
    pub size: Option<usize>,
    /// Sort keys, most significant first; relevance when empty.
    pub sort: Vec<SortField>,
    /// Source fields to return; all when empty.
    pub source_includes: Vec<String>,
    /// Source fields to leave out.
    pub source_excludes: Vec<String>,
    /// Highlighting.
    pub highlight: Option<HighlightOptions>,
    /// Aggregations to compute alongside the hits.
    pub aggregations: Option<AggregationBuilder>,
    /// Ask for an exact total instead of an estimate or lower bound.
    pub track_total_hits: Option<bool>,
    /// Drops hits scoring below this.
    pub min_score: Option<f64>,
    /// Ask the engine to explain scores (Elasticsearch).
    pub explain: bool,
    /// Sort values of the last hit of the previous page.
    pub search_after: Option<Vec<Value>>,
    /// Keep a scroll context alive for this long (Elasticsearch).
    pub scroll: Option<Duration>,
    /// Server-side search timeout (Elasticsearch).
    pub timeout: Option<Duration>,
}

impl SearchOptions {
    /// Engine defaults for everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `from`.
    pub fn from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets `size`.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    /// Sets `source_includes`.
    pub fn source_includes<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_includes = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets `source_excludes`.
    pub fn source_excludes<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_excludes = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets highlighting.
    pub fn highlight(mut self, highlight: HighlightOptions) -> Self {
        self.highlight = Some(highlight);
        self
    }

    /// Sets aggregations.
    pub fn aggregations(mut self, aggregations: AggregationBuilder) -> Self {
        self.aggregations = Some(aggregations);
        self
    }

    /// Asks for an exact total when `track` is true.
    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    /// Sets `min_score`.
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Sets `explain`.
    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Continues after the given sort values.
    pub fn search_after(mut self, values: Vec<Value>) -> Self {
        self.search_after = Some(values);
        self
    }

    /// Opens a scroll context kept alive for `keep_alive`.
    pub fn scroll(mut self, keep_alive: Duration) -> Self {
        self.scroll = Some(keep_alive);
        self
    }

    /// Sets the server-side timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Whether a total is exact or a lower bound / estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TotalRelation {
    /// `total` is the exact count.
    #[default]
    #[serde(rename = "eq")]
    Exact,
    /// `total` is a lower bound or an estimate.
    #[serde(rename = "gte")]
    LowerBound,
}

/// Normalized search response.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Total matching documents.
    pub total: u64,
    /// Whether `total` is exact.
    pub total_relation: TotalRelation,
    /// Hits in engine order.
    pub hits: Vec<Document>,
    /// Aggregation results as the engine returned them.
    pub aggregations: Option<Value>,
    /// Engine-side processing time.
    pub took_ms: u64,
    /// True when the engine stopped early on its timeout.
    pub timed_out: bool,
    /// Best score among the hits.
    pub max_score: Option<f64>,
    /// Continuation token when a scroll was requested.
    pub scroll_id: Option<String>,
}

impl SearchResult {
    /// True when `total` is exact.
    pub fn is_exact(&self) -> bool {
        self.total_relation == TotalRelation::Exact
    }

    /// Decodes every hit's source into `T`, in hit order.
    pub fn decode_hits<T: DeserializeOwned>(&self) -> ClientResult<Vec<T>> {
        self.hits.iter().map(Document::decode).collect()
    }
}
