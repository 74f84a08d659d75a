//! Meilisearch search responses and their normalization.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ClientError, ClientResult};
use crate::types::{Document, SearchOptions, SearchResult, TotalRelation};

/// Per-hit fields Meilisearch adds next to the document.
const META_FIELDS: [&str; 5] = [
    "_formatted",
    "_rankingScore",
    "_rankingScoreDetails",
    "_matchesPosition",
    "_geoDistance",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Map<String, Value>>,
    #[serde(default)]
    processing_time_ms: u64,
    /// Exhaustive count, present with `page`/`hitsPerPage` paging.
    #[serde(default)]
    total_hits: Option<u64>,
    /// Estimate, present with `offset`/`limit` paging.
    #[serde(default)]
    estimated_total_hits: Option<u64>,
}

impl SearchResponse {
    fn total(&self) -> (u64, TotalRelation) {
        match (self.total_hits, self.estimated_total_hits) {
            (Some(total), _) => (total, TotalRelation::Exact),
            (None, Some(estimate)) => (estimate, TotalRelation::LowerBound),
            (None, None) => (self.hits.len() as u64, TotalRelation::LowerBound),
        }
    }
}

/// Parses a search response into the normalized shape.
pub(crate) fn parse_search(
    body: &[u8],
    index: &str,
    primary_key: &str,
    options: &SearchOptions,
) -> ClientResult<SearchResult> {
    let response: SearchResponse = decode(body)?;
    let (total, total_relation) = response.total();
    let highlight_fields = options
        .highlight
        .as_ref()
        .map(|highlight| highlight.fields.as_slice())
        .unwrap_or_default();

    let mut hits = Vec::with_capacity(response.hits.len());
    for hit in response.hits {
        hits.push(hit_document(
            hit,
            index,
            primary_key,
            highlight_fields,
            &options.source_excludes,
        )?);
    }
    let max_score = hits
        .iter()
        .filter_map(|hit| hit.score)
        .fold(None, |max: Option<f64>, score| Some(max.map_or(score, |m| m.max(score))));

    Ok(SearchResult {
        total,
        total_relation,
        hits,
        aggregations: None,
        took_ms: response.processing_time_ms,
        timed_out: false,
        max_score,
        scroll_id: None,
    })
}

/// Reads only the total of a search response.
pub(crate) fn parse_total(body: &[u8]) -> ClientResult<(u64, TotalRelation)> {
    let response: SearchResponse = decode(body)?;
    Ok(response.total())
}

fn hit_document(
    mut hit: Map<String, Value>,
    index: &str,
    primary_key: &str,
    highlight_fields: &[String],
    excludes: &[String],
) -> ClientResult<Document> {
    let id = hit.get(primary_key).and_then(id_string).unwrap_or_default();
    let score = hit.get("_rankingScore").and_then(Value::as_f64);
    let highlight = match hit.get("_formatted") {
        Some(Value::Object(formatted)) if !highlight_fields.is_empty() => {
            Some(fragments(formatted, highlight_fields))
        }
        _ => None,
    };

    // shift_remove keeps the engine's field order in the rebuilt source
    for field in META_FIELDS {
        hit.shift_remove(field);
    }
    for field in excludes {
        hit.shift_remove(field);
    }
    let source = serde_json::to_vec(&hit)?;

    let mut document = Document::new(index, id, source);
    document.score = score;
    document.highlight = highlight;
    Ok(document)
}

fn fragments(formatted: &Map<String, Value>, fields: &[String]) -> HashMap<String, Vec<String>> {
    let mut highlight = HashMap::new();
    for field in fields {
        let values = match formatted.get(field) {
            Some(Value::String(text)) => vec![text.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => continue,
        };
        if !values.is_empty() {
            highlight.insert(field.clone(), values);
        }
    }
    highlight
}

/// Primary key values are strings or integers.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> ClientResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| ClientError::serialization(format!("invalid search response: {}", e)))
}
