//! JSON form of the query tree.
//!
//! The neutral wire representation follows the JSON query DSL shape, so the
//! Elasticsearch adapter embeds it as-is.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use super::QueryBuilder;
use super::clause::{
    Clause, FunctionScoreQuery, FuzzyQuery, GeoDistanceQuery, MatchPhraseQuery, MatchQuery,
    MultiMatchQuery, NestedQuery, QueryStringQuery, RangeQuery, ScoreFunction, TermQuery,
    TermsQuery,
};

impl Clause {
    /// Serializes the clause into its JSON query DSL form.
    pub fn to_json(&self) -> Value {
        match self {
            Clause::MatchAll { boost } => {
                let mut body = Map::new();
                insert_opt(&mut body, "boost", boost.map(Value::from));
                json!({ "match_all": body })
            }
            Clause::Match(q) => match_json(q),
            Clause::MatchPhrase(q) => match_phrase_json(q),
            Clause::MultiMatch(q) => multi_match_json(q),
            Clause::QueryString(q) => query_string_json(q),
            Clause::Term(q) => term_json(q),
            Clause::Terms(q) => terms_json(q),
            Clause::Range(q) => range_json(q),
            Clause::Exists { field } => json!({ "exists": { "field": field } }),
            Clause::Prefix { field, value } => json!({ "prefix": { field.as_str(): value } }),
            Clause::Wildcard { field, value } => {
                json!({ "wildcard": { field.as_str(): { "value": value } } })
            }
            Clause::Ids { values } => json!({ "ids": { "values": values } }),
            Clause::Fuzzy(q) => fuzzy_json(q),
            Clause::Nested(q) => nested_json(q),
            Clause::GeoDistance(q) => geo_distance_json(q),
            Clause::FunctionScore(q) => function_score_json(q),
            Clause::Bool(builder) => bool_json(builder),
            Clause::Raw(value) => value.clone(),
        }
    }
}

impl Serialize for Clause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

fn match_json(q: &MatchQuery) -> Value {
    if !q.has_options() {
        return json!({ "match": { q.field.as_str(): q.query } });
    }
    let mut body = Map::new();
    body.insert("query".to_string(), json!(q.query));
    insert_opt(&mut body, "operator", q.operator.map(|o| json!(o.as_str())));
    insert_opt(&mut body, "fuzziness", q.fuzziness.as_ref().map(|f| json!(f)));
    insert_opt(&mut body, "analyzer", q.analyzer.as_ref().map(|a| json!(a)));
    insert_opt(
        &mut body,
        "minimum_should_match",
        q.minimum_should_match.as_ref().map(|m| json!(m)),
    );
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "match": { q.field.as_str(): body } })
}

fn match_phrase_json(q: &MatchPhraseQuery) -> Value {
    if q.slop.is_none() && q.analyzer.is_none() && q.boost.is_none() {
        return json!({ "match_phrase": { q.field.as_str(): q.query } });
    }
    let mut body = Map::new();
    body.insert("query".to_string(), json!(q.query));
    insert_opt(&mut body, "slop", q.slop.map(Value::from));
    insert_opt(&mut body, "analyzer", q.analyzer.as_ref().map(|a| json!(a)));
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "match_phrase": { q.field.as_str(): body } })
}

fn multi_match_json(q: &MultiMatchQuery) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), json!(q.query));
    body.insert("fields".to_string(), json!(q.fields));
    insert_opt(&mut body, "type", q.match_type.map(|t| json!(t.as_str())));
    insert_opt(&mut body, "operator", q.operator.map(|o| json!(o.as_str())));
    insert_opt(&mut body, "fuzziness", q.fuzziness.as_ref().map(|f| json!(f)));
    insert_opt(&mut body, "analyzer", q.analyzer.as_ref().map(|a| json!(a)));
    insert_opt(&mut body, "tie_breaker", q.tie_breaker.map(Value::from));
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "multi_match": body })
}

fn query_string_json(q: &QueryStringQuery) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), json!(q.query));
    insert_opt(
        &mut body,
        "default_field",
        q.default_field.as_ref().map(|f| json!(f)),
    );
    if !q.fields.is_empty() {
        body.insert("fields".to_string(), json!(q.fields));
    }
    insert_opt(
        &mut body,
        "default_operator",
        q.default_operator.map(|o| json!(o.as_str())),
    );
    insert_opt(&mut body, "analyzer", q.analyzer.as_ref().map(|a| json!(a)));
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "query_string": body })
}

fn term_json(q: &TermQuery) -> Value {
    match q.boost {
        None => json!({ "term": { q.field.as_str(): q.value } }),
        Some(boost) => json!({ "term": { q.field.as_str(): { "value": q.value, "boost": boost } } }),
    }
}

fn terms_json(q: &TermsQuery) -> Value {
    let mut body = Map::new();
    body.insert(q.field.clone(), json!(q.values));
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "terms": body })
}

fn range_json(q: &RangeQuery) -> Value {
    let mut body = Map::new();
    for (op, value) in q.bounds() {
        body.insert(op.to_string(), value.clone());
    }
    insert_opt(&mut body, "format", q.format.as_ref().map(|f| json!(f)));
    insert_opt(&mut body, "time_zone", q.time_zone.as_ref().map(|t| json!(t)));
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "range": { q.field.as_str(): body } })
}

fn fuzzy_json(q: &FuzzyQuery) -> Value {
    let mut body = Map::new();
    body.insert("value".to_string(), json!(q.value));
    insert_opt(&mut body, "fuzziness", q.fuzziness.as_ref().map(|f| json!(f)));
    insert_opt(&mut body, "prefix_length", q.prefix_length.map(Value::from));
    insert_opt(&mut body, "max_expansions", q.max_expansions.map(Value::from));
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "fuzzy": { q.field.as_str(): body } })
}

fn nested_json(q: &NestedQuery) -> Value {
    let mut body = Map::new();
    body.insert("path".to_string(), json!(q.path));
    body.insert("query".to_string(), q.query.to_json());
    insert_opt(&mut body, "score_mode", q.score_mode.map(|m| json!(m.as_str())));
    insert_opt(&mut body, "ignore_unmapped", q.ignore_unmapped.map(Value::from));
    json!({ "nested": body })
}

fn geo_distance_json(q: &GeoDistanceQuery) -> Value {
    let mut body = Map::new();
    body.insert("distance".to_string(), json!(q.distance));
    insert_opt(
        &mut body,
        "distance_type",
        q.distance_type.as_ref().map(|d| json!(d)),
    );
    body.insert(q.field.clone(), json!({ "lat": q.lat, "lon": q.lon }));
    json!({ "geo_distance": body })
}

fn score_function_json(function: &ScoreFunction) -> Value {
    match function {
        ScoreFunction::Weight { weight, filter } => {
            let mut body = Map::new();
            insert_opt(&mut body, "filter", filter.as_ref().map(|f| f.to_json()));
            body.insert("weight".to_string(), json!(weight));
            Value::Object(body)
        }
        ScoreFunction::FieldValueFactor {
            field,
            factor,
            modifier,
            missing,
        } => {
            let mut inner = Map::new();
            inner.insert("field".to_string(), json!(field));
            insert_opt(&mut inner, "factor", factor.map(Value::from));
            insert_opt(&mut inner, "modifier", modifier.as_ref().map(|m| json!(m)));
            insert_opt(&mut inner, "missing", missing.map(Value::from));
            json!({ "field_value_factor": inner })
        }
        ScoreFunction::Decay {
            function,
            field,
            origin,
            scale,
            offset,
            decay,
        } => {
            let mut params = Map::new();
            params.insert("origin".to_string(), origin.clone());
            params.insert("scale".to_string(), scale.clone());
            insert_opt(&mut params, "offset", offset.clone());
            insert_opt(&mut params, "decay", decay.map(Value::from));
            json!({ function.as_str(): { field.as_str(): params } })
        }
        ScoreFunction::RandomScore { seed, field } => {
            let mut inner = Map::new();
            insert_opt(&mut inner, "seed", seed.clone());
            insert_opt(&mut inner, "field", field.as_ref().map(|f| json!(f)));
            json!({ "random_score": inner })
        }
        ScoreFunction::Raw(value) => value.clone(),
    }
}

fn function_score_json(q: &FunctionScoreQuery) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), q.query.to_json());
    if !q.functions.is_empty() {
        let functions: Vec<Value> = q.functions.iter().map(score_function_json).collect();
        body.insert("functions".to_string(), Value::Array(functions));
    }
    insert_opt(&mut body, "score_mode", q.score_mode.as_ref().map(|m| json!(m)));
    insert_opt(&mut body, "boost_mode", q.boost_mode.as_ref().map(|m| json!(m)));
    insert_opt(&mut body, "max_boost", q.max_boost.map(Value::from));
    insert_opt(&mut body, "min_score", q.min_score.map(Value::from));
    insert_opt(&mut body, "boost", q.boost.map(Value::from));
    json!({ "function_score": body })
}

fn clause_list(clauses: &[Clause]) -> Value {
    Value::Array(clauses.iter().map(Clause::to_json).collect())
}

/// Always emits the `bool` wrapper; the short-circuit lives in `QueryBuilder::to_clause`.
pub(crate) fn bool_json(builder: &QueryBuilder) -> Value {
    let mut body = Map::new();
    if !builder.must.is_empty() {
        body.insert("must".to_string(), clause_list(&builder.must));
    }
    if !builder.should.is_empty() {
        body.insert("should".to_string(), clause_list(&builder.should));
    }
    if !builder.must_not.is_empty() {
        body.insert("must_not".to_string(), clause_list(&builder.must_not));
    }
    if !builder.filter.is_empty() {
        body.insert("filter".to_string(), clause_list(&builder.filter));
    }
    insert_opt(
        &mut body,
        "minimum_should_match",
        builder.minimum_should_match.clone(),
    );
    insert_opt(&mut body, "boost", builder.boost.map(Value::from));
    json!({ "bool": body })
}
