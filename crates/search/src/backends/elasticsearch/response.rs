//! Elasticsearch response shapes and their normalization.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use serde_json::value::RawValue;

use crate::error::{ClientError, ClientResult};
use crate::types::{Document, SearchResult, TotalRelation};

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    timed_out: bool,
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: Hits,
    #[serde(default)]
    aggregations: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    total: Option<HitsTotal>,
    #[serde(default)]
    max_score: Option<f64>,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// `hits.total` is an object since 7.x and a bare number before.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HitsTotal {
    Object {
        value: u64,
        #[serde(default)]
        relation: TotalRelation,
    },
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_version", default)]
    version: Option<i64>,
    #[serde(rename = "_source", default)]
    source: Option<Box<RawValue>>,
    #[serde(default)]
    highlight: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    sort: Option<Vec<Value>>,
}

impl From<Hit> for Document {
    fn from(hit: Hit) -> Self {
        Document {
            id: hit.id,
            index: hit.index,
            source: raw_bytes(hit.source),
            version: hit.version,
            score: hit.score,
            highlight: hit.highlight,
            sort: hit.sort,
        }
    }
}

fn raw_bytes(source: Option<Box<RawValue>>) -> Vec<u8> {
    source
        .map(|raw| raw.get().as_bytes().to_vec())
        .unwrap_or_default()
}

/// Parses a `_search` (or scroll) response.
pub(crate) fn parse_search(body: &[u8]) -> ClientResult<SearchResult> {
    let response: SearchResponse = decode(body, "search")?;
    let returned = response.hits.hits.len() as u64;
    let (total, total_relation) = match response.hits.total {
        Some(HitsTotal::Object { value, relation }) => (value, relation),
        Some(HitsTotal::Number(value)) => (value, TotalRelation::Exact),
        // track_total_hits=false omits the total
        None => (returned, TotalRelation::LowerBound),
    };

    Ok(SearchResult {
        total,
        total_relation,
        hits: response.hits.hits.into_iter().map(Document::from).collect(),
        aggregations: response.aggregations,
        took_ms: response.took,
        timed_out: response.timed_out,
        max_score: response.hits.max_score,
        scroll_id: response.scroll_id,
    })
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_version", default)]
    version: Option<i64>,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Box<RawValue>>,
}

/// Parses a `GET /{index}/_doc/{id}` response; `None` when not found.
pub(crate) fn parse_get(body: &[u8]) -> ClientResult<Option<Document>> {
    let response: GetResponse = decode(body, "get")?;
    if !response.found {
        return Ok(None);
    }
    Ok(Some(Document {
        id: response.id,
        index: response.index,
        source: raw_bytes(response.source),
        version: response.version,
        score: None,
        highlight: None,
        sort: None,
    }))
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

pub(crate) fn parse_count(body: &[u8]) -> ClientResult<u64> {
    let response: CountResponse = decode(body, "count")?;
    Ok(response.count)
}

/// Outcome of `_update_by_query` / `_delete_by_query`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ByQueryResult {
    /// Time the request took.
    #[serde(rename = "took", default)]
    pub took_ms: u64,
    /// True when the engine stopped early on its timeout.
    #[serde(default)]
    pub timed_out: bool,
    /// Documents the query matched.
    #[serde(default)]
    pub total: u64,
    /// Documents updated.
    #[serde(default)]
    pub updated: u64,
    /// Documents deleted.
    #[serde(default)]
    pub deleted: u64,
    /// Documents skipped on version conflicts.
    #[serde(default)]
    pub version_conflicts: u64,
    /// Per-document failures, as reported.
    #[serde(default)]
    pub failures: Vec<Value>,
}

pub(crate) fn parse_by_query(body: &[u8]) -> ClientResult<ByQueryResult> {
    decode(body, "by-query")
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    cluster_name: Option<String>,
    status: String,
}

/// Returns `(cluster_name, status)` from `_cluster/health`.
pub(crate) fn parse_health(body: &[u8]) -> ClientResult<(Option<String>, String)> {
    let response: HealthResponse = decode(body, "cluster health")?;
    Ok((response.cluster_name, response.status))
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8], what: &str) -> ClientResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| ClientError::serialization(format!("invalid {} response: {}", what, e)))
}
