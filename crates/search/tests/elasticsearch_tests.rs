//! Elasticsearch adapter tests against a recording mock transport.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use common::*;
use helios_search::{
    BulkOperation, ClientError, ErrorKind, IndexOptions, QueryBuilder, RequestContext,
    SearchClient, SearchOptions, TransportError, match_query, range,
};

fn empty_search() -> Reply {
    json_reply(
        200,
        json!({
            "took": 1,
            "timed_out": false,
            "hits": { "total": { "value": 0, "relation": "eq" }, "max_score": null, "hits": [] }
        }),
    )
}

#[tokio::test]
async fn test_search_sends_bool_query() {
    let sender = MockSender::new(|_| empty_search());
    let client = es_client(&["http://es1:9200"], sender.clone());

    let query = QueryBuilder::new()
        .must(match_query("name", "laptop"))
        .filter(range("price").lte(1000));
    client
        .search(&RequestContext::new(), "products", &query)
        .await
        .unwrap();

    let requests = sender.requests();
    assert_eq!(sender.lines(), vec!["POST /products/_search"]);
    let body = requests[0].body_json().unwrap();
    assert_eq!(body["query"]["bool"]["must"], json!([{ "match": { "name": "laptop" } }]));
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([{ "range": { "price": { "lte": 1000 } } }])
    );
}

#[tokio::test]
async fn test_index_then_get_round_trips_source_bytes() {
    let store: Arc<Mutex<HashMap<String, Vec<u8>>>> = Arc::default();
    let state = store.clone();
    let sender = MockSender::new(move |request| {
        let path = route(request).to_string();
        let id = path.rsplit('/').next().unwrap_or_default().to_string();
        match request.method.as_str() {
            "PUT" => {
                state
                    .lock()
                    .insert(id.clone(), request.body.clone().unwrap_or_default());
                json_reply(201, json!({ "_index": "products", "_id": id, "result": "created" }))
            }
            "GET" => match state.lock().get(&id) {
                Some(source) => raw_reply(
                    200,
                    format!(
                        r#"{{"_index":"products","_id":"{}","_version":1,"found":true,"_source":{}}}"#,
                        id,
                        String::from_utf8_lossy(source)
                    ),
                ),
                None => json_reply(404, json!({ "_index": "products", "_id": id, "found": false })),
            },
            _ => raw_reply(405, ""),
        }
    });
    let client = es_client(&["http://es1:9200"], sender.clone());
    let ctx = RequestContext::new();

    let document = json!({ "name": "Gaming Laptop", "price": 999, "tags": ["rgb"] });
    let receipt = client.index(&ctx, "products", "1", &document).await.unwrap();
    assert!(receipt.is_completed());

    let fetched = client.get(&ctx, "products", "1").await.unwrap();
    assert_eq!(fetched.id, "1");
    assert_eq!(fetched.version, Some(1));
    assert_eq!(&fetched.source, store.lock().get("1").unwrap());
    assert_eq!(fetched.source_json().unwrap(), document);

    let err = client.get(&ctx, "products", "9").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound { ref id, .. } if id == "9"));
}

#[tokio::test]
async fn test_bulk_reports_partial_failure_in_input_order() {
    let sender = MockSender::new(|_| {
        json_reply(
            200,
            json!({
                "took": 7,
                "errors": true,
                "items": [
                    { "index": { "_index": "products", "_id": "1", "status": 201 } },
                    { "index": { "_index": "products", "_id": "2", "status": 400,
                        "error": { "type": "mapper_parsing_exception", "reason": "failed to parse field [price]" } } },
                    { "index": { "_index": "products", "_id": "3", "status": 201 } },
                    { "delete": { "_index": "products", "_id": "4", "status": 200 } }
                ]
            }),
        )
    });
    let client = es_client(&["http://es1:9200"], sender.clone());
    let ops = vec![
        BulkOperation::index("products", "1", json!({ "price": 1 })),
        BulkOperation::index("products", "2", json!({ "price": "abc" })),
        BulkOperation::index("products", "3", json!({ "price": 3 })),
        BulkOperation::delete("products", "4"),
    ];

    let result = client.bulk(&RequestContext::new(), &ops).await.unwrap();
    assert_eq!(result.items.len(), 4);
    assert_eq!(result.success_count, 3);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.took_ms, 7);
    let ids: Vec<&str> = result.items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    let failed = &result.items[1];
    assert_eq!(failed.status, 400);
    assert!(failed.error.as_deref().unwrap().contains("mapper_parsing_exception"));

    let requests = sender.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].header_value("Content-Type"),
        Some("application/x-ndjson")
    );
}

#[tokio::test]
async fn test_count_uses_count_endpoint() {
    let sender = MockSender::new(|_| json_reply(200, json!({ "count": 42, "_shards": { "total": 1 } })));
    let client = es_client(&["http://es1:9200"], sender.clone());

    let count = client
        .count(&RequestContext::new(), "products", &QueryBuilder::new())
        .await
        .unwrap();
    assert_eq!(count, 42);
    assert_eq!(sender.lines(), vec!["POST /products/_count"]);
    assert_eq!(
        sender.requests()[0].body_json().unwrap(),
        json!({ "query": { "match_all": {} } })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_rotate_nodes_evenly() {
    let nodes = ["http://es1:9200", "http://es2:9200", "http://es3:9200"];
    let sender = MockSender::new(|_| empty_search());
    let client = Arc::new(es_client(&nodes, sender.clone()));

    let mut handles = Vec::new();
    for _ in 0..30 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .search(&RequestContext::new(), "products", &QueryBuilder::new())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut per_node: HashMap<String, usize> = HashMap::new();
    for request in sender.requests() {
        let node = nodes
            .iter()
            .find(|node| request.url.starts_with(*node))
            .unwrap();
        *per_node.entry(node.to_string()).or_default() += 1;
    }
    assert_eq!(per_node.len(), 3);
    assert!(per_node.values().all(|count| *count == 10), "{:?}", per_node);
}

#[tokio::test]
async fn test_retry_moves_to_next_node() {
    let sender = MockSender::new(|request| {
        if request.url.starts_with("http://es1:9200") {
            Err(TransportError::Connect("connection refused".to_string()))
        } else {
            empty_search()
        }
    });
    let client = es_client(&["http://es1:9200", "http://es2:9200"], sender.clone());

    client
        .search(&RequestContext::new(), "products", &QueryBuilder::new())
        .await
        .unwrap();
    let requests = sender.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.starts_with("http://es1:9200"));
    assert!(requests[1].url.starts_with("http://es2:9200"));
}

#[tokio::test]
async fn test_engine_errors_are_not_retried() {
    let sender = MockSender::new(|_| {
        json_reply(
            400,
            json!({ "error": { "type": "parsing_exception", "reason": "unknown query [mtch]" }, "status": 400 }),
        )
    });
    let client = es_client(&["http://es1:9200", "http://es2:9200"], sender.clone());

    let err = client
        .search(&RequestContext::new(), "products", &QueryBuilder::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    assert_eq!(sender.request_count(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_are_connection_errors() {
    let sender = MockSender::new(|_| raw_reply(503, ""));
    let client = es_client(&["http://es1:9200"], sender.clone());

    let err = client
        .health_check(&RequestContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionError);
    assert!(err.is_retryable());
    // first attempt plus two retries
    assert_eq!(sender.request_count(), 3);
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() {
    let sender = MockSender::new(|_| empty_search());
    let client = es_client(&["http://es1:9200"], sender.clone());
    let ctx = RequestContext::new();
    ctx.cancel();

    let err = client
        .search(&ctx, "products", &QueryBuilder::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(sender.request_count(), 0);
}

#[tokio::test]
async fn test_closed_client_rejects_calls() {
    let sender = MockSender::new(|_| empty_search());
    let client = es_client(&["http://es1:9200"], sender.clone());
    client.close().await.unwrap();

    let err = client
        .search(&RequestContext::new(), "products", &QueryBuilder::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionError);
    assert_eq!(sender.request_count(), 0);
}

#[tokio::test]
async fn test_index_lifecycle() {
    let sender = MockSender::new(|request| match (request.method.as_str(), route(request)) {
        ("PUT", "/products") => json_reply(200, json!({ "acknowledged": true, "index": "products" })),
        ("HEAD", "/products") => raw_reply(200, ""),
        ("HEAD", _) => raw_reply(404, ""),
        ("POST", "/products/_refresh") => json_reply(200, json!({ "_shards": { "total": 1 } })),
        ("DELETE", "/products") => json_reply(200, json!({ "acknowledged": true })),
        _ => raw_reply(500, ""),
    });
    let client = es_client(&["http://es1:9200"], sender.clone());
    let ctx = RequestContext::new();

    let settings = helios_search::IndexSettings::new()
        .shards(1)
        .replicas(0)
        .mappings(json!({ "properties": { "name": { "type": "text" } } }));
    client.create_index(&ctx, "products", &settings).await.unwrap();
    assert!(client.index_exists(&ctx, "products").await.unwrap());
    assert!(!client.index_exists(&ctx, "missing").await.unwrap());
    client.refresh(&ctx, "products").await.unwrap();
    client.delete_index(&ctx, "products").await.unwrap();

    let body = sender.requests()[0].body_json().unwrap();
    assert_eq!(body["settings"]["number_of_shards"], 1);
    assert_eq!(body["mappings"]["properties"]["name"]["type"], "text");
}

#[tokio::test]
async fn test_update_sends_partial_doc() {
    let sender = MockSender::new(|request| match route(request) {
        "/products/_update/1" => json_reply(
            200,
            json!({ "_index": "products", "_id": "1", "_version": 2, "result": "updated" }),
        ),
        _ => json_reply(
            404,
            json!({
                "error": {
                    "type": "document_missing_exception",
                    "reason": "[9]: document missing",
                    "index": "products"
                },
                "status": 404
            }),
        ),
    });
    let client = es_client(&["http://es1:9200"], sender.clone());
    let ctx = RequestContext::new();

    let receipt = client
        .update(&ctx, "products", "1", &json!({ "price": 899 }), &IndexOptions::new())
        .await
        .unwrap();
    assert!(receipt.is_completed());
    assert_eq!(sender.lines()[0], "POST /products/_update/1");
    assert_eq!(
        sender.requests()[0].body_json().unwrap(),
        json!({ "doc": { "price": 899 } })
    );

    let err = client
        .update(&ctx, "products", "9", &json!({ "price": 1 }), &IndexOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound { ref id, .. } if id == "9"));
}

#[tokio::test]
async fn test_update_and_delete_by_query() {
    let sender = MockSender::new(|request| match route(request) {
        "/products/_update_by_query" => json_reply(
            200,
            json!({ "took": 12, "timed_out": false, "total": 5, "updated": 5, "version_conflicts": 0, "failures": [] }),
        ),
        "/products/_delete_by_query" => json_reply(
            200,
            json!({ "took": 8, "timed_out": false, "total": 2, "deleted": 2, "failures": [] }),
        ),
        _ => raw_reply(500, ""),
    });
    let client = es_client(&["http://es1:9200"], sender.clone());
    let ctx = RequestContext::new();
    let query = QueryBuilder::new().filter(range("price").lte(10));

    let updated = client
        .update_by_query(&ctx, "products", &query, Some(&json!("ctx._source.sale = true")))
        .await
        .unwrap();
    assert_eq!(updated.total, 5);
    assert_eq!(updated.updated, 5);

    let deleted = client.delete_by_query(&ctx, "products", &query).await.unwrap();
    assert_eq!(deleted.deleted, 2);
    assert_eq!(deleted.took_ms, 8);

    assert_eq!(
        sender.lines(),
        vec![
            "POST /products/_update_by_query?conflicts=proceed",
            "POST /products/_delete_by_query?conflicts=proceed",
        ]
    );
    let requests = sender.requests();
    let body = requests[0].body_json().unwrap();
    assert_eq!(
        body["script"],
        json!({ "source": "ctx._source.sale = true", "lang": "painless" })
    );
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([{ "range": { "price": { "lte": 10 } } }])
    );
    assert_eq!(
        requests[1].body_json().unwrap()["query"],
        body["query"]
    );
}

#[tokio::test]
async fn test_scroll_pages_and_clear() {
    let page = |scroll_id: &str, id: &str| {
        raw_reply(
            200,
            format!(
                r#"{{"_scroll_id":"{}","took":2,"timed_out":false,"hits":{{"total":{{"value":2,"relation":"eq"}},"max_score":1.0,"hits":[{{"_index":"products","_id":"{}","_score":1.0,"_source":{{"n":{}}}}}]}}}}"#,
                scroll_id, id, id
            ),
        )
    };
    let sender = MockSender::new(move |request| match (request.method.as_str(), route(request)) {
        ("POST", "/products/_search") => page("scroll-1", "1"),
        ("POST", "/_search/scroll") => page("scroll-2", "2"),
        ("DELETE", "/_search/scroll") => json_reply(404, json!({ "succeeded": true, "num_freed": 0 })),
        _ => raw_reply(500, ""),
    });
    let client = es_client(&["http://es1:9200"], sender.clone());
    let ctx = RequestContext::new();
    let keep_alive = Duration::from_secs(60);

    let first = client
        .search_with_options(
            &ctx,
            "products",
            &QueryBuilder::new(),
            &SearchOptions::new().size(1).scroll(keep_alive),
        )
        .await
        .unwrap();
    assert_eq!(first.scroll_id.as_deref(), Some("scroll-1"));
    assert_eq!(first.hits[0].id, "1");

    let second = client.scroll(&ctx, "scroll-1", keep_alive).await.unwrap();
    assert_eq!(second.scroll_id.as_deref(), Some("scroll-2"));
    assert_eq!(second.hits[0].source_json().unwrap(), json!({ "n": 2 }));

    // expired scroll contexts answer 404
    client
        .clear_scroll(&ctx, &["scroll-2".to_string()])
        .await
        .unwrap();

    assert_eq!(
        sender.lines(),
        vec![
            "POST /products/_search?scroll=60000ms",
            "POST /_search/scroll",
            "DELETE /_search/scroll",
        ]
    );
    let requests = sender.requests();
    assert_eq!(
        requests[1].body_json().unwrap(),
        json!({ "scroll": "60000ms", "scroll_id": "scroll-1" })
    );
    assert_eq!(
        requests[2].body_json().unwrap(),
        json!({ "scroll_id": ["scroll-2"] })
    );
}

#[tokio::test]
async fn test_clear_scroll_reports_other_failures() {
    let sender = MockSender::new(|_| {
        json_reply(
            400,
            json!({ "error": { "type": "illegal_argument_exception", "reason": "Cannot parse scroll id" }, "status": 400 }),
        )
    });
    let client = es_client(&["http://es1:9200"], sender.clone());

    let err = client
        .clear_scroll(&RequestContext::new(), &["bogus".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}
