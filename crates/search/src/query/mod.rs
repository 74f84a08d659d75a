//! Backend-neutral query DSL.
//!
//! A [`QueryBuilder`] holds four clause collections with the usual boolean
//! semantics:
//!
//! - `must` - all must match, contributes to score
//! - `should` - any may match, contributes to score
//! - `must_not` - none may match
//! - `filter` - all must match, no scoring
//!
//! Leaf clauses come from the constructor functions in this module
//! ([`match_query`], [`term`], [`range`], ...). The builder compiles into a
//! typed [`Clause`] tree, which each backend translates on its own terms.
//!
//! # Example
//!
//! ```
//! use helios_search::query::{self, QueryBuilder};
//! use serde_json::json;
//!
//! let body = QueryBuilder::new()
//!     .must(query::match_query("name", "laptop"))
//!     .filter(query::range("price").lte(1000))
//!     .build();
//!
//! assert_eq!(body["query"]["bool"]["must"], json!([{ "match": { "name": "laptop" } }]));
//! assert_eq!(body["query"]["bool"]["filter"], json!([{ "range": { "price": { "lte": 1000 } } }]));
//! ```

mod clause;
mod json;

pub use clause::{
    Clause, FunctionScoreQuery, FuzzyQuery, GeoDistanceQuery, MatchPhraseQuery, MatchQuery,
    MultiMatchQuery, MultiMatchType, NestedQuery, NestedScoreMode, Operator, QueryStringQuery,
    RangeQuery, ScoreFunction, TermQuery, TermsQuery, exists, function_score, fuzzy, geo_distance,
    ids, match_all, match_phrase, match_query, multi_match, nested, prefix, query_string, range,
    raw, term, terms, wildcard,
};

use serde_json::{Value, json};

/// Boolean query tree builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    pub(crate) must: Vec<Clause>,
    pub(crate) should: Vec<Clause>,
    pub(crate) must_not: Vec<Clause>,
    pub(crate) filter: Vec<Clause>,
    pub(crate) minimum_should_match: Option<Value>,
    pub(crate) boost: Option<f64>,
}

impl QueryBuilder {
    /// Creates an empty builder (compiles to match-everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause that must match.
    pub fn must(mut self, clause: impl Into<Clause>) -> Self {
        self.must.push(clause.into());
        self
    }

    /// Adds a clause that should match.
    pub fn should(mut self, clause: impl Into<Clause>) -> Self {
        self.should.push(clause.into());
        self
    }

    /// Adds a clause that must not match.
    pub fn must_not(mut self, clause: impl Into<Clause>) -> Self {
        self.must_not.push(clause.into());
        self
    }

    /// Adds a non-scoring clause that must match.
    pub fn filter(mut self, clause: impl Into<Clause>) -> Self {
        self.filter.push(clause.into());
        self
    }

    /// Adds several `must` clauses.
    pub fn must_all<I, C>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Clause>,
    {
        self.must.extend(clauses.into_iter().map(Into::into));
        self
    }

    /// Adds several `should` clauses.
    pub fn should_all<I, C>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Clause>,
    {
        self.should.extend(clauses.into_iter().map(Into::into));
        self
    }

    /// Adds several `must_not` clauses.
    pub fn must_not_all<I, C>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Clause>,
    {
        self.must_not.extend(clauses.into_iter().map(Into::into));
        self
    }

    /// Adds several `filter` clauses.
    pub fn filter_all<I, C>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Clause>,
    {
        self.filter.extend(clauses.into_iter().map(Into::into));
        self
    }

    /// Minimum number (or percentage string) of `should` clauses that must match.
    pub fn minimum_should_match(mut self, value: impl Into<Value>) -> Self {
        self.minimum_should_match = Some(value.into());
        self
    }

    /// Boost of the whole bool query.
    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Clauses that must match and score.
    pub fn must_clauses(&self) -> &[Clause] {
        &self.must
    }

    /// Optional clauses that add to the score.
    pub fn should_clauses(&self) -> &[Clause] {
        &self.should
    }

    /// Clauses that must not match.
    pub fn must_not_clauses(&self) -> &[Clause] {
        &self.must_not
    }

    /// Clauses that must match without scoring.
    pub fn filter_clauses(&self) -> &[Clause] {
        &self.filter
    }

    /// True when no clause has been added.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
            && self.filter.is_empty()
    }

    /// Compiles the builder into a single clause.
    ///
    /// Empty compiles to `match_all`; exactly one `must` clause with nothing
    /// else compiles to that clause unwrapped; anything else becomes `bool`.
    pub fn to_clause(&self) -> Clause {
        if self.is_empty() {
            return Clause::MatchAll { boost: self.boost };
        }
        if self.must.len() == 1
            && self.should.is_empty()
            && self.must_not.is_empty()
            && self.filter.is_empty()
            && self.minimum_should_match.is_none()
            && self.boost.is_none()
        {
            return self.must[0].clone();
        }
        Clause::Bool(Box::new(self.clone()))
    }

    /// Returns the compiled inner query, without the `{"query": ...}` envelope.
    pub fn build_query(&self) -> Value {
        self.to_clause().to_json()
    }

    /// Returns `{"query": <compiled query>}`.
    pub fn build(&self) -> Value {
        json!({ "query": self.build_query() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_matches_everything() {
        let body = QueryBuilder::new().build();
        assert_eq!(body, json!({ "query": { "match_all": {} } }));
    }

    #[test]
    fn test_single_must_is_unwrapped() {
        let body = QueryBuilder::new().must(term("status", "active")).build();
        assert_eq!(body["query"], json!({ "term": { "status": "active" } }));
    }

    #[test]
    fn test_single_must_with_boost_keeps_wrapper() {
        let query = QueryBuilder::new()
            .must(term("status", "active"))
            .boost(2.0)
            .build_query();
        assert_eq!(query["bool"]["boost"], json!(2.0));
        assert_eq!(
            query["bool"]["must"],
            json!([{ "term": { "status": "active" } }])
        );
    }

    #[test]
    fn test_single_filter_keeps_wrapper() {
        let query = QueryBuilder::new()
            .filter(term("status", "active"))
            .build_query();
        assert_eq!(
            query,
            json!({ "bool": { "filter": [{ "term": { "status": "active" } }] } })
        );
    }

    #[test]
    fn test_must_and_filter() {
        let body = QueryBuilder::new()
            .must(match_query("name", "laptop"))
            .filter(range("price").lte(1000))
            .build();
        assert_eq!(
            body["query"]["bool"]["must"],
            json!([{ "match": { "name": "laptop" } }])
        );
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "range": { "price": { "lte": 1000 } } }])
        );
        assert!(body["query"]["bool"].get("should").is_none());
    }

    #[test]
    fn test_should_with_minimum() {
        let query = QueryBuilder::new()
            .should_all([term("color", "red"), term("color", "blue")])
            .minimum_should_match(1)
            .build_query();
        assert_eq!(query["bool"]["minimum_should_match"], json!(1));
        assert_eq!(query["bool"]["should"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_nested_bool_clause() {
        let inner = QueryBuilder::new()
            .should(term("color", "red"))
            .should(term("color", "blue"));
        let query = QueryBuilder::new()
            .must(match_query("name", "shirt"))
            .filter(inner)
            .build_query();
        assert_eq!(
            query["bool"]["filter"][0]["bool"]["should"][1],
            json!({ "term": { "color": "blue" } })
        );
    }

    #[test]
    fn test_compilation_does_not_mutate() {
        let builder = QueryBuilder::new().must(exists("sku"));
        let first = builder.build();
        let second = builder.build();
        assert_eq!(first, second);
        assert_eq!(builder.must_clauses().len(), 1);
    }
}
