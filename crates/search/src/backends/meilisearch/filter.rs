//! Decomposes a query tree into Meilisearch's `q` text and filter expression.
//!
//! Meilisearch has one free-text query and one boolean filter language, so the
//! tree is split structurally:
//!
//! - `q` is the text of the first full-text clause (`match`, `match_phrase`,
//!   `multi_match`, `query_string`) in `must`, then in `should`.
//! - `filter` and the remaining `must` clauses become `AND`ed filter
//!   expressions; `must_not` clauses become `NOT (...)`.
//! - `should` clauses become an `OR` group when nothing else constrains the
//!   query (or `minimum_should_match` is set); otherwise they only affect
//!   scoring and are left out.
//!
//! Anything without a filter equivalent is reported in
//! [`Translation::unsupported`] for the caller to warn about or reject.

use serde_json::Value;

use crate::query::{Clause, GeoDistanceQuery, QueryBuilder, RangeQuery};

/// The decomposed query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Translation {
    pub q: String,
    pub filter: Option<String>,
    /// Names of clauses that were dropped.
    pub unsupported: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Must(usize),
    Should(usize),
}

/// A compiled filter expression.
#[derive(Debug)]
struct Expr {
    text: String,
    /// True when the text has a top-level `AND` and needs parentheses
    /// inside `OR` groups.
    compound: bool,
}

impl Expr {
    fn atom(text: String) -> Self {
        Self {
            text,
            compound: false,
        }
    }

    fn grouped(self) -> String {
        if self.compound {
            format!("({})", self.text)
        } else {
            self.text
        }
    }
}

/// Splits `query` into `q` and a filter string.
pub(crate) fn translate(query: &QueryBuilder, primary_key: &str) -> Translation {
    let slot = text_slot(query);
    let q = match slot {
        Some(Slot::Must(i)) => query.must[i].text(),
        Some(Slot::Should(i)) => query.should[i].text(),
        None => None,
    }
    .unwrap_or_default()
    .to_string();

    let mut translator = Translator {
        primary_key,
        unsupported: Vec::new(),
    };
    let filter = translator
        .compile_bool(query, slot)
        .map(|expr| expr.text);

    Translation {
        q,
        filter,
        unsupported: translator.unsupported,
    }
}

fn text_slot(query: &QueryBuilder) -> Option<Slot> {
    if let Some(i) = query.must.iter().position(|c| c.text().is_some()) {
        return Some(Slot::Must(i));
    }
    query
        .should
        .iter()
        .position(|c| c.text().is_some())
        .map(Slot::Should)
}

struct Translator<'a> {
    primary_key: &'a str,
    unsupported: Vec<String>,
}

impl Translator<'_> {
    /// Compiles the four collections; `text` is the clause already used as `q`.
    fn compile_bool(&mut self, query: &QueryBuilder, text: Option<Slot>) -> Option<Expr> {
        let mut parts: Vec<Expr> = Vec::new();

        for clause in &query.filter {
            parts.extend(self.compile(clause));
        }
        for (i, clause) in query.must.iter().enumerate() {
            if text != Some(Slot::Must(i)) {
                parts.extend(self.compile(clause));
            }
        }
        for clause in &query.must_not {
            if let Some(expr) = self.compile(clause) {
                parts.push(Expr::atom(format!("NOT ({})", expr.text)));
            }
        }

        let should_required = query.minimum_should_match.is_some()
            || (query.must.is_empty() && query.filter.is_empty());
        let text_in_should = matches!(text, Some(Slot::Should(_)));
        if should_required && !text_in_should && !query.should.is_empty() {
            let alternatives: Vec<String> = query
                .should
                .iter()
                .filter_map(|clause| self.compile(clause))
                .map(Expr::grouped)
                .collect();
            match alternatives.len() {
                0 => {}
                1 => parts.push(Expr::atom(alternatives.into_iter().collect())),
                _ => parts.push(Expr::atom(format!("({})", alternatives.join(" OR ")))),
            }
        }

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Expr {
                text: parts
                    .into_iter()
                    .map(|expr| expr.text)
                    .collect::<Vec<_>>()
                    .join(" AND "),
                compound: true,
            }),
        }
    }

    fn compile(&mut self, clause: &Clause) -> Option<Expr> {
        match clause {
            Clause::MatchAll { .. } => None,
            Clause::Term(q) => match comparison(&q.field, "=", &q.value) {
                Some(text) => Some(Expr::atom(text)),
                None => self.drop_clause(clause),
            },
            Clause::Terms(q) => {
                let alternatives: Vec<String> = q
                    .values
                    .iter()
                    .filter_map(|value| comparison(&q.field, "=", value))
                    .collect();
                match alternatives.len() {
                    0 => self.drop_clause(clause),
                    1 => alternatives.into_iter().next().map(Expr::atom),
                    _ => Some(Expr::atom(format!("({})", alternatives.join(" OR ")))),
                }
            }
            Clause::Range(q) => match range(q) {
                Some(expr) => Some(expr),
                None => self.drop_clause(clause),
            },
            Clause::Exists { field } => Some(Expr::atom(format!("{} EXISTS", field))),
            Clause::Ids { values } => {
                let quoted: Vec<String> = values.iter().map(|id| quote(id)).collect();
                Some(Expr::atom(format!(
                    "{} IN [{}]",
                    self.primary_key,
                    quoted.join(", ")
                )))
            }
            Clause::Bool(inner) => {
                let expr = self.compile_bool(inner, None)?;
                Some(Expr::atom(expr.grouped()))
            }
            // Meilisearch flattens nested objects, so the inner clause's dotted
            // field names already address the right attributes.
            Clause::Nested(q) => self.compile(&q.query),
            Clause::FunctionScore(q) => self.compile(&q.query),
            Clause::GeoDistance(q) => match geo_radius(q) {
                Some(expr) => Some(expr),
                None => self.drop_clause(clause),
            },
            _ => self.drop_clause(clause),
        }
    }

    fn drop_clause(&mut self, clause: &Clause) -> Option<Expr> {
        self.unsupported.push(clause.name().to_string());
        None
    }
}

fn comparison(field: &str, op: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null if op == "=" => Some(format!("{} IS NULL", field)),
        _ => literal(value).map(|literal| format!("{} {} {}", field, op, literal)),
    }
}

fn range(q: &RangeQuery) -> Option<Expr> {
    let ops: Vec<String> = q
        .bounds()
        .filter_map(|(bound, value)| {
            let op = match bound {
                "gt" => ">",
                "gte" => ">=",
                "lt" => "<",
                _ => "<=",
            };
            comparison(&q.field, op, value)
        })
        .collect();
    match ops.len() {
        0 => None,
        1 => ops.into_iter().next().map(Expr::atom),
        _ => Some(Expr {
            text: ops.join(" AND "),
            compound: true,
        }),
    }
}

/// `_geoRadius` works on the reserved `_geo` attribute only.
fn geo_radius(q: &GeoDistanceQuery) -> Option<Expr> {
    if q.field != "_geo" {
        return None;
    }
    let meters = distance_in_meters(&q.distance)?;
    Some(Expr::atom(format!(
        "_geoRadius({}, {}, {})",
        q.lat, q.lon, meters
    )))
}

fn distance_in_meters(distance: &str) -> Option<u64> {
    let distance = distance.trim();
    let split = distance
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(distance.len());
    let (number, unit) = distance.split_at(split);
    let value: f64 = number.parse().ok()?;
    let factor = match unit.trim() {
        "" | "m" => 1.0,
        "km" => 1000.0,
        "mi" => 1609.344,
        "yd" => 0.9144,
        "ft" => 0.3048,
        _ => return None,
    };
    Some((value * factor).round() as u64)
}

fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(quote(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Quotes a string literal, escaping backslashes and double quotes.
pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{
        exists, geo_distance, ids, match_phrase, match_query, multi_match, nested, prefix, range,
        term, terms, wildcard,
    };
    use serde_json::json;

    fn filter_of(query: &QueryBuilder) -> Option<String> {
        translate(query, "id").filter
    }

    #[test]
    fn test_text_and_range() {
        let query = QueryBuilder::new()
            .must(match_query("name", "laptop"))
            .filter(range("price").lte(1000));
        let t = translate(&query, "id");
        assert_eq!(t.q, "laptop");
        assert_eq!(t.filter.as_deref(), Some("price <= 1000"));
        assert!(t.unsupported.is_empty());
    }

    #[test]
    fn test_terms_become_or_group() {
        let query = QueryBuilder::new().filter(terms("color", ["red", "blue"]));
        assert_eq!(
            filter_of(&query).as_deref(),
            Some(r#"(color = "red" OR color = "blue")"#)
        );
    }

    #[test]
    fn test_empty_query() {
        let t = translate(&QueryBuilder::new(), "id");
        assert_eq!(t.q, "");
        assert_eq!(t.filter, None);
    }

    #[test]
    fn test_range_with_both_bounds() {
        let query = QueryBuilder::new().filter(range("price").gte(10).lt(99.5));
        assert_eq!(filter_of(&query).as_deref(), Some("price >= 10 AND price < 99.5"));
    }

    #[test]
    fn test_filters_and_must_are_anded() {
        let query = QueryBuilder::new()
            .must(multi_match("gaming laptop", ["name", "description"]))
            .must(term("in_stock", true))
            .filter(term("brand", "Acme"))
            .filter(exists("discount"));
        let t = translate(&query, "id");
        assert_eq!(t.q, "gaming laptop");
        assert_eq!(
            t.filter.as_deref(),
            Some(r#"brand = "Acme" AND discount EXISTS AND in_stock = true"#)
        );
    }

    #[test]
    fn test_must_not_is_negated() {
        let query = QueryBuilder::new()
            .filter(term("category", "books"))
            .must_not(range("price").gt(50).lte(100));
        assert_eq!(
            filter_of(&query).as_deref(),
            Some(r#"category = "books" AND NOT (price > 50 AND price <= 100)"#)
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let query = QueryBuilder::new().filter(term("title", r#"The "Best" \ Worst"#));
        assert_eq!(
            filter_of(&query).as_deref(),
            Some(r#"title = "The \"Best\" \\ Worst""#)
        );
    }

    #[test]
    fn test_text_taken_from_should_when_must_has_none() {
        let query = QueryBuilder::new()
            .should(match_phrase("title", "rust in action"))
            .filter(term("lang", "en"));
        let t = translate(&query, "id");
        assert_eq!(t.q, "rust in action");
        assert_eq!(t.filter.as_deref(), Some(r#"lang = "en""#));
    }

    #[test]
    fn test_should_only_query_becomes_or_group() {
        let query = QueryBuilder::new()
            .should(term("color", "red"))
            .should(range("price").gte(1).lte(5));
        assert_eq!(
            filter_of(&query).as_deref(),
            Some(r#"(color = "red" OR (price >= 1 AND price <= 5))"#)
        );
    }

    #[test]
    fn test_optional_should_is_left_out() {
        let query = QueryBuilder::new()
            .filter(term("lang", "en"))
            .should(term("featured", true));
        assert_eq!(filter_of(&query).as_deref(), Some(r#"lang = "en""#));
    }

    #[test]
    fn test_nested_bool_is_parenthesized() {
        let inner = QueryBuilder::new()
            .filter(term("status", "active"))
            .filter(range("stock").gt(0));
        let query = QueryBuilder::new()
            .filter(inner)
            .filter(term("region", "eu"));
        assert_eq!(
            filter_of(&query).as_deref(),
            Some(r#"(status = "active" AND stock > 0) AND region = "eu""#)
        );
    }

    #[test]
    fn test_ids_use_primary_key() {
        let query = QueryBuilder::new().filter(ids(["a1", "b2"]));
        assert_eq!(
            translate(&query, "sku").filter.as_deref(),
            Some(r#"sku IN ["a1", "b2"]"#)
        );
    }

    #[test]
    fn test_nested_clause_uses_inner_fields() {
        let query = QueryBuilder::new().filter(nested("variants", term("variants.color", "red")));
        assert_eq!(
            filter_of(&query).as_deref(),
            Some(r#"variants.color = "red""#)
        );
    }

    #[test]
    fn test_unsupported_clauses_are_reported() {
        let query = QueryBuilder::new()
            .must(match_query("name", "laptop"))
            .must(match_query("description", "fast"))
            .filter(prefix("sku", "AB"))
            .filter(wildcard("name", "lap*"))
            .filter(term("brand", "Acme"));
        let t = translate(&query, "id");
        assert_eq!(t.q, "laptop");
        assert_eq!(t.filter.as_deref(), Some(r#"brand = "Acme""#));
        assert_eq!(t.unsupported, vec!["prefix", "wildcard", "match"]);
    }

    #[test]
    fn test_geo_distance() {
        let query = QueryBuilder::new().filter(geo_distance("_geo", 48.85, 2.35, "2km"));
        assert_eq!(
            filter_of(&query).as_deref(),
            Some("_geoRadius(48.85, 2.35, 2000)")
        );

        let query = QueryBuilder::new().filter(geo_distance("location", 48.85, 2.35, "2km"));
        let t = translate(&query, "id");
        assert_eq!(t.filter, None);
        assert_eq!(t.unsupported, vec!["geo_distance"]);
    }

    #[test]
    fn test_untranslatable_term_and_range_are_reported() {
        let query = QueryBuilder::new()
            .filter(range("price"))
            .filter(term("meta", json!({ "a": 1 })))
            .filter(term("brand", "Acme"));
        let t = translate(&query, "id");
        assert_eq!(t.filter.as_deref(), Some(r#"brand = "Acme""#));
        assert_eq!(t.unsupported, vec!["range", "term"]);
    }

    #[test]
    fn test_null_term() {
        let query = QueryBuilder::new().filter(term("deleted_at", Value::Null));
        assert_eq!(filter_of(&query).as_deref(), Some("deleted_at IS NULL"));
    }
}
