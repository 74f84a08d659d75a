//! Named aggregation builder.
//!
//! Aggregations accumulate into one JSON map keyed by name. The builder does
//! no validation; backends without aggregation support decide what to do with
//! the request.

use serde_json::{Map, Value, json};

use crate::query::Clause;

/// One range bucket for a `range` aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBucket {
    /// Bucket key; the engine derives one when absent.
    pub key: Option<String>,
    /// Inclusive lower bound.
    pub from: Option<Value>,
    /// Exclusive upper bound.
    pub to: Option<Value>,
}

impl RangeBucket {
    /// A bucket from `from` (inclusive) to `to` (exclusive).
    pub fn new(from: Option<Value>, to: Option<Value>) -> Self {
        Self {
            key: None,
            from,
            to,
        }
    }

    /// Names the bucket.
    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(ref key) = self.key {
            body.insert("key".to_string(), json!(key));
        }
        if let Some(ref from) = self.from {
            body.insert("from".to_string(), from.clone());
        }
        if let Some(ref to) = self.to {
            body.insert("to".to_string(), to.clone());
        }
        Value::Object(body)
    }
}

/// Accumulates named aggregation specs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationBuilder {
    aggs: Map<String, Value>,
}

impl AggregationBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket by distinct field values.
    pub fn terms(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        self.custom(name, json!({ "terms": { "field": field } }))
    }

    /// Bucket by distinct field values, keeping the top `size`.
    pub fn terms_with_size(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        size: u32,
    ) -> Self {
        let field = field.into();
        self.custom(name, json!({ "terms": { "field": field, "size": size } }))
    }

    /// Fixed-width numeric buckets.
    pub fn histogram(self, name: impl Into<String>, field: impl Into<String>, interval: f64) -> Self {
        let field = field.into();
        self.custom(
            name,
            json!({ "histogram": { "field": field, "interval": interval } }),
        )
    }

    /// Calendar buckets (`"day"`, `"1M"`, ...).
    pub fn date_histogram(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        calendar_interval: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let interval = calendar_interval.into();
        self.custom(
            name,
            json!({ "date_histogram": { "field": field, "calendar_interval": interval } }),
        )
    }

    /// Explicit range buckets.
    pub fn range(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        buckets: Vec<RangeBucket>,
    ) -> Self {
        let field = field.into();
        let ranges: Vec<Value> = buckets.iter().map(RangeBucket::to_json).collect();
        self.custom(name, json!({ "range": { "field": field, "ranges": ranges } }))
    }

    /// Average of a numeric field.
    pub fn avg(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "avg", field)
    }

    /// Sum of a numeric field.
    pub fn sum(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "sum", field)
    }

    /// Minimum of a numeric field.
    pub fn min(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "min", field)
    }

    /// Maximum of a numeric field.
    pub fn max(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "max", field)
    }

    /// Approximate count of distinct values.
    pub fn cardinality(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "cardinality", field)
    }

    /// Count, min, max, avg, and sum in one aggregation.
    pub fn stats(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "stats", field)
    }

    /// Top matching documents per bucket.
    pub fn top_hits(self, name: impl Into<String>, size: u32) -> Self {
        self.custom(name, json!({ "top_hits": { "size": size } }))
    }

    /// Aggregate inside nested objects at `path`.
    pub fn nested(
        self,
        name: impl Into<String>,
        path: impl Into<String>,
        sub_aggs: AggregationBuilder,
    ) -> Self {
        let path = path.into();
        self.custom(
            name,
            json!({ "nested": { "path": path }, "aggs": sub_aggs.build() }),
        )
    }

    /// Restrict sub-aggregations to documents matching `filter`.
    pub fn filter(
        self,
        name: impl Into<String>,
        filter: impl Into<Clause>,
        sub_aggs: AggregationBuilder,
    ) -> Self {
        let filter: Clause = filter.into();
        let mut spec = json!({ "filter": filter.to_json() });
        if !sub_aggs.is_empty() {
            spec["aggs"] = Value::Object(sub_aggs.build());
        }
        self.custom(name, spec)
    }

    /// Adds an arbitrary aggregation spec under `name`.
    pub fn custom(mut self, name: impl Into<String>, spec: Value) -> Self {
        self.aggs.insert(name.into(), spec);
        self
    }

    /// True when no aggregation was added.
    pub fn is_empty(&self) -> bool {
        self.aggs.is_empty()
    }

    /// Number of top-level aggregations.
    pub fn len(&self) -> usize {
        self.aggs.len()
    }

    /// Returns the accumulated map.
    pub fn build(&self) -> Map<String, Value> {
        self.aggs.clone()
    }

    fn metric(self, name: impl Into<String>, kind: &str, field: impl Into<String>) -> Self {
        let field = field.into();
        self.custom(name, json!({ kind: { "field": field } }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::term;

    #[test]
    fn test_terms_and_metrics() {
        let aggs = AggregationBuilder::new()
            .terms("by_brand", "brand")
            .avg("avg_price", "price")
            .build();
        assert_eq!(aggs["by_brand"], json!({ "terms": { "field": "brand" } }));
        assert_eq!(aggs["avg_price"], json!({ "avg": { "field": "price" } }));
    }

    #[test]
    fn test_range_buckets() {
        let aggs = AggregationBuilder::new()
            .range(
                "price_bands",
                "price",
                vec![
                    RangeBucket::new(None, Some(json!(100))).keyed("cheap"),
                    RangeBucket::new(Some(json!(100)), None),
                ],
            )
            .build();
        assert_eq!(
            aggs["price_bands"]["range"]["ranges"],
            json!([{ "key": "cheap", "to": 100 }, { "from": 100 }])
        );
    }

    #[test]
    fn test_nested_and_filter() {
        let aggs = AggregationBuilder::new()
            .nested(
                "variants",
                "variants",
                AggregationBuilder::new().terms("colors", "variants.color"),
            )
            .filter(
                "in_stock",
                term("in_stock", true),
                AggregationBuilder::new().sum("units", "stock"),
            )
            .build();
        assert_eq!(aggs["variants"]["nested"]["path"], json!("variants"));
        assert_eq!(
            aggs["variants"]["aggs"]["colors"],
            json!({ "terms": { "field": "variants.color" } })
        );
        assert_eq!(
            aggs["in_stock"]["filter"],
            json!({ "term": { "in_stock": true } })
        );
        assert_eq!(aggs["in_stock"]["aggs"]["units"]["sum"]["field"], json!("stock"));
    }

    #[test]
    fn test_same_name_replaces() {
        let aggs = AggregationBuilder::new()
            .min("price", "price")
            .max("price", "price")
            .build();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs["price"], json!({ "max": { "field": "price" } }));
    }
}
