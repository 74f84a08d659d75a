//! Typed query clauses and their fluent builders.

// Clause fields and builder methods carry the Elasticsearch parameter of the same name
#![allow(missing_docs)]

use serde_json::Value;

use super::QueryBuilder;

/// A single query fragment.
///
/// Each variant is a distinct clause shape, so translators match on the
/// variant instead of inspecting untyped maps. [`Clause::Raw`] carries a JSON
/// fragment for constructs the DSL does not model; only backends that speak
/// the JSON query DSL can use it.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Matches every document.
    MatchAll { boost: Option<f64> },
    /// Analyzed full-text match on one field.
    Match(MatchQuery),
    /// Phrase match on one field.
    MatchPhrase(MatchPhraseQuery),
    /// Full-text match across several fields.
    MultiMatch(MultiMatchQuery),
    /// Lucene-syntax query string.
    QueryString(QueryStringQuery),
    /// Exact value match.
    Term(TermQuery),
    /// Exact match against any of several values.
    Terms(TermsQuery),
    /// Bounded comparison.
    Range(RangeQuery),
    /// The field has a non-null value.
    Exists { field: String },
    /// The field starts with a prefix.
    Prefix { field: String, value: String },
    /// Wildcard pattern match.
    Wildcard { field: String, value: String },
    /// Document id is one of the given ids.
    Ids { values: Vec<String> },
    /// Edit-distance match.
    Fuzzy(FuzzyQuery),
    /// Query against nested objects.
    Nested(NestedQuery),
    /// Distance from a geo point.
    GeoDistance(GeoDistanceQuery),
    /// Rescoring wrapper.
    FunctionScore(FunctionScoreQuery),
    /// Boolean combination of clauses.
    Bool(Box<QueryBuilder>),
    /// Opaque JSON fragment passed through as-is.
    Raw(Value),
}

impl Clause {
    /// Returns the clause name as used in the JSON query DSL.
    pub fn name(&self) -> &'static str {
        match self {
            Clause::MatchAll { .. } => "match_all",
            Clause::Match(_) => "match",
            Clause::MatchPhrase(_) => "match_phrase",
            Clause::MultiMatch(_) => "multi_match",
            Clause::QueryString(_) => "query_string",
            Clause::Term(_) => "term",
            Clause::Terms(_) => "terms",
            Clause::Range(_) => "range",
            Clause::Exists { .. } => "exists",
            Clause::Prefix { .. } => "prefix",
            Clause::Wildcard { .. } => "wildcard",
            Clause::Ids { .. } => "ids",
            Clause::Fuzzy(_) => "fuzzy",
            Clause::Nested(_) => "nested",
            Clause::GeoDistance(_) => "geo_distance",
            Clause::FunctionScore(_) => "function_score",
            Clause::Bool(_) => "bool",
            Clause::Raw(_) => "raw",
        }
    }

    /// Returns the free text of a full-text clause, if this is one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Clause::Match(q) => Some(&q.query),
            Clause::MatchPhrase(q) => Some(&q.query),
            Clause::MultiMatch(q) => Some(&q.query),
            Clause::QueryString(q) => Some(&q.query),
            _ => None,
        }
    }
}

impl From<QueryBuilder> for Clause {
    fn from(builder: QueryBuilder) -> Self {
        Clause::Bool(Box::new(builder))
    }
}

/// Boolean operator for combining analyzed terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
}

/// How `multi_match` combines per-field scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiMatchType {
    BestFields,
    MostFields,
    CrossFields,
    Phrase,
    PhrasePrefix,
    BoolPrefix,
}

impl MultiMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultiMatchType::BestFields => "best_fields",
            MultiMatchType::MostFields => "most_fields",
            MultiMatchType::CrossFields => "cross_fields",
            MultiMatchType::Phrase => "phrase",
            MultiMatchType::PhrasePrefix => "phrase_prefix",
            MultiMatchType::BoolPrefix => "bool_prefix",
        }
    }
}

/// Full-text match on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    pub field: String,
    pub query: String,
    pub operator: Option<Operator>,
    pub fuzziness: Option<String>,
    pub analyzer: Option<String>,
    pub minimum_should_match: Option<String>,
    pub boost: Option<f64>,
}

impl MatchQuery {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            operator: None,
            fuzziness: None,
            analyzer: None,
            minimum_should_match: None,
            boost: None,
        }
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Sets the fuzziness (`"AUTO"`, `"1"`, `"2"`).
    pub fn fuzziness(mut self, fuzziness: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzziness.into());
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn minimum_should_match(mut self, value: impl Into<String>) -> Self {
        self.minimum_should_match = Some(value.into());
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub(crate) fn has_options(&self) -> bool {
        self.operator.is_some()
            || self.fuzziness.is_some()
            || self.analyzer.is_some()
            || self.minimum_should_match.is_some()
            || self.boost.is_some()
    }
}

impl From<MatchQuery> for Clause {
    fn from(query: MatchQuery) -> Self {
        Clause::Match(query)
    }
}

/// Phrase match on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPhraseQuery {
    pub field: String,
    pub query: String,
    pub slop: Option<u32>,
    pub analyzer: Option<String>,
    pub boost: Option<f64>,
}

impl MatchPhraseQuery {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            slop: None,
            analyzer: None,
            boost: None,
        }
    }

    pub fn slop(mut self, slop: u32) -> Self {
        self.slop = Some(slop);
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl From<MatchPhraseQuery> for Clause {
    fn from(query: MatchPhraseQuery) -> Self {
        Clause::MatchPhrase(query)
    }
}

/// Full-text match across several fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatchQuery {
    pub query: String,
    pub fields: Vec<String>,
    pub match_type: Option<MultiMatchType>,
    pub operator: Option<Operator>,
    pub fuzziness: Option<String>,
    pub analyzer: Option<String>,
    pub tie_breaker: Option<f64>,
    pub boost: Option<f64>,
}

impl MultiMatchQuery {
    pub fn new<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            query: query.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            match_type: None,
            operator: None,
            fuzziness: None,
            analyzer: None,
            tie_breaker: None,
            boost: None,
        }
    }

    pub fn match_type(mut self, match_type: MultiMatchType) -> Self {
        self.match_type = Some(match_type);
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn fuzziness(mut self, fuzziness: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzziness.into());
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn tie_breaker(mut self, tie_breaker: f64) -> Self {
        self.tie_breaker = Some(tie_breaker);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl From<MultiMatchQuery> for Clause {
    fn from(query: MultiMatchQuery) -> Self {
        Clause::MultiMatch(query)
    }
}

/// Lucene-syntax query string.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStringQuery {
    pub query: String,
    pub default_field: Option<String>,
    pub fields: Vec<String>,
    pub default_operator: Option<Operator>,
    pub analyzer: Option<String>,
    pub boost: Option<f64>,
}

impl QueryStringQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            default_field: None,
            fields: Vec::new(),
            default_operator: None,
            analyzer: None,
            boost: None,
        }
    }

    pub fn default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = Some(field.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_operator(mut self, operator: Operator) -> Self {
        self.default_operator = Some(operator);
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl From<QueryStringQuery> for Clause {
    fn from(query: QueryStringQuery) -> Self {
        Clause::QueryString(query)
    }
}

/// Exact value match.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub field: String,
    pub value: Value,
    pub boost: Option<f64>,
}

impl TermQuery {
    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl From<TermQuery> for Clause {
    fn from(query: TermQuery) -> Self {
        Clause::Term(query)
    }
}

/// Exact match against any of several values.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsQuery {
    pub field: String,
    pub values: Vec<Value>,
    pub boost: Option<f64>,
}

impl TermsQuery {
    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl From<TermsQuery> for Clause {
    fn from(query: TermsQuery) -> Self {
        Clause::Terms(query)
    }
}

/// Range comparison on one field. Unset bounds are open.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
    pub format: Option<String>,
    pub time_zone: Option<String>,
    pub boost: Option<f64>,
}

impl RangeQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            format: None,
            time_zone: None,
            boost: None,
        }
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    /// Date format for string bounds (e.g. `"yyyy-MM-dd"`).
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Bounds in a fixed order: `gt`, `gte`, `lt`, `lte`.
    pub fn bounds(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        [
            ("gt", self.gt.as_ref()),
            ("gte", self.gte.as_ref()),
            ("lt", self.lt.as_ref()),
            ("lte", self.lte.as_ref()),
        ]
        .into_iter()
        .filter_map(|(op, value)| value.map(|v| (op, v)))
    }
}

impl From<RangeQuery> for Clause {
    fn from(query: RangeQuery) -> Self {
        Clause::Range(query)
    }
}

/// Edit-distance match.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    pub field: String,
    pub value: String,
    pub fuzziness: Option<String>,
    pub prefix_length: Option<u32>,
    pub max_expansions: Option<u32>,
    pub boost: Option<f64>,
}

impl FuzzyQuery {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            fuzziness: None,
            prefix_length: None,
            max_expansions: None,
            boost: None,
        }
    }

    pub fn fuzziness(mut self, fuzziness: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzziness.into());
        self
    }

    pub fn prefix_length(mut self, prefix_length: u32) -> Self {
        self.prefix_length = Some(prefix_length);
        self
    }

    pub fn max_expansions(mut self, max_expansions: u32) -> Self {
        self.max_expansions = Some(max_expansions);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl From<FuzzyQuery> for Clause {
    fn from(query: FuzzyQuery) -> Self {
        Clause::Fuzzy(query)
    }
}

/// How nested hit scores roll up into the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedScoreMode {
    Avg,
    Max,
    Min,
    Sum,
    None,
}

impl NestedScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NestedScoreMode::Avg => "avg",
            NestedScoreMode::Max => "max",
            NestedScoreMode::Min => "min",
            NestedScoreMode::Sum => "sum",
            NestedScoreMode::None => "none",
        }
    }
}

/// Query against nested objects under `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedQuery {
    pub path: String,
    pub query: Box<Clause>,
    pub score_mode: Option<NestedScoreMode>,
    pub ignore_unmapped: Option<bool>,
}

impl NestedQuery {
    pub fn new(path: impl Into<String>, query: impl Into<Clause>) -> Self {
        Self {
            path: path.into(),
            query: Box::new(query.into()),
            score_mode: None,
            ignore_unmapped: None,
        }
    }

    pub fn score_mode(mut self, score_mode: NestedScoreMode) -> Self {
        self.score_mode = Some(score_mode);
        self
    }

    pub fn ignore_unmapped(mut self, ignore: bool) -> Self {
        self.ignore_unmapped = Some(ignore);
        self
    }
}

impl From<NestedQuery> for Clause {
    fn from(query: NestedQuery) -> Self {
        Clause::Nested(query)
    }
}

/// Documents within `distance` of a point.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDistanceQuery {
    pub field: String,
    pub lat: f64,
    pub lon: f64,
    /// Distance with unit, e.g. `"12km"`.
    pub distance: String,
    pub distance_type: Option<String>,
}

impl GeoDistanceQuery {
    pub fn new(field: impl Into<String>, lat: f64, lon: f64, distance: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            lat,
            lon,
            distance: distance.into(),
            distance_type: None,
        }
    }

    /// `"arc"` (default) or `"plane"`.
    pub fn distance_type(mut self, distance_type: impl Into<String>) -> Self {
        self.distance_type = Some(distance_type.into());
        self
    }
}

impl From<GeoDistanceQuery> for Clause {
    fn from(query: GeoDistanceQuery) -> Self {
        Clause::GeoDistance(query)
    }
}

/// A scoring function inside `function_score`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFunction {
    /// Constant weight, optionally restricted by a filter.
    Weight {
        weight: f64,
        filter: Option<Box<Clause>>,
    },
    /// Score from a numeric document field.
    FieldValueFactor {
        field: String,
        factor: Option<f64>,
        modifier: Option<String>,
        missing: Option<f64>,
    },
    /// Decay around an origin (`gauss`, `linear`, or `exp`).
    Decay {
        function: String,
        field: String,
        origin: Value,
        scale: Value,
        offset: Option<Value>,
        decay: Option<f64>,
    },
    /// Random scoring with an optional seed.
    RandomScore {
        seed: Option<Value>,
        field: Option<String>,
    },
    /// Arbitrary function JSON.
    Raw(Value),
}

/// Rescoring wrapper around an inner query.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionScoreQuery {
    pub query: Box<Clause>,
    pub functions: Vec<ScoreFunction>,
    pub score_mode: Option<String>,
    pub boost_mode: Option<String>,
    pub max_boost: Option<f64>,
    pub min_score: Option<f64>,
    pub boost: Option<f64>,
}

impl FunctionScoreQuery {
    pub fn new(query: impl Into<Clause>) -> Self {
        Self {
            query: Box::new(query.into()),
            functions: Vec::new(),
            score_mode: None,
            boost_mode: None,
            max_boost: None,
            min_score: None,
            boost: None,
        }
    }

    pub fn function(mut self, function: ScoreFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn weight(self, weight: f64) -> Self {
        self.function(ScoreFunction::Weight {
            weight,
            filter: None,
        })
    }

    pub fn field_value_factor(self, field: impl Into<String>, factor: f64) -> Self {
        self.function(ScoreFunction::FieldValueFactor {
            field: field.into(),
            factor: Some(factor),
            modifier: None,
            missing: None,
        })
    }

    /// `multiply`, `sum`, `avg`, `first`, `max`, or `min`.
    pub fn score_mode(mut self, mode: impl Into<String>) -> Self {
        self.score_mode = Some(mode.into());
        self
    }

    /// `multiply`, `replace`, `sum`, `avg`, `max`, or `min`.
    pub fn boost_mode(mut self, mode: impl Into<String>) -> Self {
        self.boost_mode = Some(mode.into());
        self
    }

    pub fn max_boost(mut self, max_boost: f64) -> Self {
        self.max_boost = Some(max_boost);
        self
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl From<FunctionScoreQuery> for Clause {
    fn from(query: FunctionScoreQuery) -> Self {
        Clause::FunctionScore(query)
    }
}

// ============================================================================
// Leaf constructors
// ============================================================================

/// Matches every document.
pub fn match_all() -> Clause {
    Clause::MatchAll { boost: None }
}

/// Analyzed full-text match.
pub fn match_query(field: impl Into<String>, text: impl Into<String>) -> MatchQuery {
    MatchQuery::new(field, text)
}

/// Phrase match.
pub fn match_phrase(field: impl Into<String>, text: impl Into<String>) -> MatchPhraseQuery {
    MatchPhraseQuery::new(field, text)
}

/// Full-text match across several fields.
pub fn multi_match<I, S>(text: impl Into<String>, fields: I) -> MultiMatchQuery
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    MultiMatchQuery::new(text, fields)
}

/// Lucene-syntax query string.
pub fn query_string(query: impl Into<String>) -> QueryStringQuery {
    QueryStringQuery::new(query)
}

/// Exact value match.
pub fn term(field: impl Into<String>, value: impl Into<Value>) -> TermQuery {
    TermQuery {
        field: field.into(),
        value: value.into(),
        boost: None,
    }
}

/// Exact match against any of `values`.
pub fn terms<I, V>(field: impl Into<String>, values: I) -> TermsQuery
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    TermsQuery {
        field: field.into(),
        values: values.into_iter().map(Into::into).collect(),
        boost: None,
    }
}

/// Range comparison; add bounds with `gt`/`gte`/`lt`/`lte`.
pub fn range(field: impl Into<String>) -> RangeQuery {
    RangeQuery::new(field)
}

/// The field has a value.
pub fn exists(field: impl Into<String>) -> Clause {
    Clause::Exists {
        field: field.into(),
    }
}

/// Prefix match.
pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Clause {
    Clause::Prefix {
        field: field.into(),
        value: value.into(),
    }
}

/// Wildcard match (`*` and `?`).
pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Clause {
    Clause::Wildcard {
        field: field.into(),
        value: pattern.into(),
    }
}

/// Document id is one of `ids`.
pub fn ids<I, S>(ids: I) -> Clause
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Clause::Ids {
        values: ids.into_iter().map(Into::into).collect(),
    }
}

/// Edit-distance match.
pub fn fuzzy(field: impl Into<String>, value: impl Into<String>) -> FuzzyQuery {
    FuzzyQuery::new(field, value)
}

/// Query against nested objects.
pub fn nested(path: impl Into<String>, query: impl Into<Clause>) -> NestedQuery {
    NestedQuery::new(path, query)
}

/// Documents within `distance` of (`lat`, `lon`).
pub fn geo_distance(
    field: impl Into<String>,
    lat: f64,
    lon: f64,
    distance: impl Into<String>,
) -> GeoDistanceQuery {
    GeoDistanceQuery::new(field, lat, lon, distance)
}

/// Rescoring wrapper.
pub fn function_score(query: impl Into<Clause>) -> FunctionScoreQuery {
    FunctionScoreQuery::new(query)
}

/// Opaque JSON fragment.
pub fn raw(fragment: Value) -> Clause {
    Clause::Raw(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_bounds_order() {
        let q = range("price").lte(1000).gt(10);
        let bounds: Vec<_> = q.bounds().map(|(op, v)| (op, v.clone())).collect();
        assert_eq!(bounds, vec![("gt", json!(10)), ("lte", json!(1000))]);
    }

    #[test]
    fn test_text_extraction() {
        let clause: Clause = match_query("name", "laptop").into();
        assert_eq!(clause.text(), Some("laptop"));

        let clause: Clause = multi_match("gaming laptop", ["name", "description"]).into();
        assert_eq!(clause.text(), Some("gaming laptop"));

        let clause: Clause = term("color", "red").into();
        assert_eq!(clause.text(), None);
    }

    #[test]
    fn test_terms_collects_values() {
        let q = terms("color", ["red", "blue"]);
        assert_eq!(q.values, vec![json!("red"), json!("blue")]);
    }

    #[test]
    fn test_clause_names() {
        assert_eq!(match_all().name(), "match_all");
        assert_eq!(Clause::from(fuzzy("name", "lapto")).name(), "fuzzy");
        assert_eq!(Clause::from(QueryBuilder::new()).name(), "bool");
    }
}
