//! Request bodies for the Elasticsearch REST API.

use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::query::QueryBuilder;
use crate::types::{IndexSettings, SearchOptions};

/// Builds the `_search` body from a query and its options.
pub(crate) fn search_body(query: &QueryBuilder, options: &SearchOptions) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), query.build_query());

    if let Some(from) = options.from {
        body.insert("from".to_string(), json!(from));
    }
    if let Some(size) = options.size {
        body.insert("size".to_string(), json!(size));
    }
    if !options.sort.is_empty() {
        let sort: Vec<Value> = options
            .sort
            .iter()
            .map(|s| json!({ s.field.as_str(): { "order": s.order.as_str() } }))
            .collect();
        body.insert("sort".to_string(), Value::Array(sort));
    }
    if let Some(source) = source_filter(options) {
        body.insert("_source".to_string(), source);
    }
    if let Some(ref highlight) = options.highlight {
        let fields: Map<String, Value> = highlight
            .fields
            .iter()
            .map(|field| (field.clone(), json!({})))
            .collect();
        let mut spec = Map::new();
        spec.insert("fields".to_string(), Value::Object(fields));
        if let Some(ref pre) = highlight.pre_tag {
            spec.insert("pre_tags".to_string(), json!([pre]));
        }
        if let Some(ref post) = highlight.post_tag {
            spec.insert("post_tags".to_string(), json!([post]));
        }
        if let Some(size) = highlight.fragment_size {
            spec.insert("fragment_size".to_string(), json!(size));
        }
        if let Some(count) = highlight.number_of_fragments {
            spec.insert("number_of_fragments".to_string(), json!(count));
        }
        body.insert("highlight".to_string(), Value::Object(spec));
    }
    if let Some(ref aggs) = options.aggregations {
        if !aggs.is_empty() {
            body.insert("aggs".to_string(), Value::Object(aggs.build()));
        }
    }
    if let Some(track) = options.track_total_hits {
        body.insert("track_total_hits".to_string(), json!(track));
    }
    if let Some(min_score) = options.min_score {
        body.insert("min_score".to_string(), json!(min_score));
    }
    if options.explain {
        body.insert("explain".to_string(), json!(true));
    }
    if let Some(ref after) = options.search_after {
        body.insert("search_after".to_string(), Value::Array(after.clone()));
    }
    if let Some(timeout) = options.timeout {
        body.insert("timeout".to_string(), json!(time_value(timeout)));
    }

    Value::Object(body)
}

fn source_filter(options: &SearchOptions) -> Option<Value> {
    match (
        options.source_includes.is_empty(),
        options.source_excludes.is_empty(),
    ) {
        (true, true) => None,
        (false, true) => Some(json!(options.source_includes)),
        _ => Some(json!({
            "includes": options.source_includes,
            "excludes": options.source_excludes,
        })),
    }
}

/// Body for `PUT /{index}`.
pub(crate) fn create_index_body(settings: &IndexSettings) -> Value {
    let mut index_settings = match settings.settings {
        Some(Value::Object(ref extra)) => extra.clone(),
        _ => Map::new(),
    };
    if let Some(shards) = settings.number_of_shards {
        index_settings.insert("number_of_shards".to_string(), json!(shards));
    }
    if let Some(replicas) = settings.number_of_replicas {
        index_settings.insert("number_of_replicas".to_string(), json!(replicas));
    }

    let mut body = Map::new();
    if !index_settings.is_empty() {
        body.insert("settings".to_string(), Value::Object(index_settings));
    }
    if let Some(ref mappings) = settings.mappings {
        body.insert("mappings".to_string(), mappings.clone());
    }
    if let Some(ref aliases) = settings.aliases {
        body.insert("aliases".to_string(), aliases.clone());
    }
    Value::Object(body)
}

/// Body for `_update_by_query`; `script` is a painless source or a full script object.
pub(crate) fn update_by_query_body(query: &QueryBuilder, script: Option<&Value>) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), query.build_query());
    match script {
        Some(Value::String(source)) => {
            body.insert(
                "script".to_string(),
                json!({ "source": source, "lang": "painless" }),
            );
        }
        Some(script) => {
            body.insert("script".to_string(), script.clone());
        }
        None => {}
    }
    Value::Object(body)
}

/// Formats a duration as an Elasticsearch time value.
pub(crate) fn time_value(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregationBuilder;
    use crate::query::{match_query, range, term};
    use crate::types::{HighlightOptions, SortField};

    #[test]
    fn test_search_body_carries_query_and_paging() {
        let query = QueryBuilder::new()
            .must(match_query("name", "laptop"))
            .filter(range("price").lte(1000));
        let body = search_body(&query, &SearchOptions::new().from(20).size(10));

        assert_eq!(body["query"]["bool"]["must"], json!([{ "match": { "name": "laptop" } }]));
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "range": { "price": { "lte": 1000 } } }])
        );
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 10);
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn test_search_body_options() {
        let options = SearchOptions::new()
            .sort(SortField::desc("price"))
            .source_includes(["name", "price"])
            .highlight(HighlightOptions::fields(["name"]).tags("<b>", "</b>"))
            .aggregations(AggregationBuilder::new().terms("by_brand", "brand"))
            .track_total_hits(true)
            .timeout(Duration::from_secs(2));
        let body = search_body(&QueryBuilder::new(), &options);

        assert_eq!(body["sort"], json!([{ "price": { "order": "desc" } }]));
        assert_eq!(body["_source"], json!(["name", "price"]));
        assert_eq!(body["highlight"]["fields"], json!({ "name": {} }));
        assert_eq!(body["highlight"]["pre_tags"], json!(["<b>"]));
        assert_eq!(body["aggs"]["by_brand"]["terms"]["field"], "brand");
        assert_eq!(body["track_total_hits"], true);
        assert_eq!(body["timeout"], "2000ms");
    }

    #[test]
    fn test_source_excludes_use_object_form() {
        let options = SearchOptions::new().source_excludes(["internal"]);
        let body = search_body(&QueryBuilder::new(), &options);
        assert_eq!(body["_source"], json!({ "includes": [], "excludes": ["internal"] }));
    }

    #[test]
    fn test_create_index_body() {
        let settings = IndexSettings::new()
            .shards(3)
            .replicas(1)
            .mappings(json!({ "properties": { "name": { "type": "text" } } }));
        let body = create_index_body(&settings);
        assert_eq!(body["settings"], json!({ "number_of_shards": 3, "number_of_replicas": 1 }));
        assert_eq!(body["mappings"]["properties"]["name"]["type"], "text");
        assert!(body.get("aliases").is_none());
    }

    #[test]
    fn test_update_by_query_script_forms() {
        let query = QueryBuilder::new().filter(term("status", "draft"));
        let body = update_by_query_body(&query, Some(&json!("ctx._source.status = 'live'")));
        assert_eq!(body["script"]["lang"], "painless");

        let body = update_by_query_body(&query, None);
        assert!(body.get("script").is_none());
        assert_eq!(body["query"], json!({ "bool": { "filter": [{ "term": { "status": "draft" } }] } }));
    }
}
