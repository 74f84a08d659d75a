//! Index settings and per-write options.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings for `create_index`.
///
/// Elasticsearch reads shards, replicas, mappings, aliases, and `settings`;
/// Meilisearch reads the primary key and the attribute lists. Each backend
/// ignores the fields it has no concept for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Primary shard count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_shards: Option<u32>,
    /// Replicas per shard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_replicas: Option<u32>,
    /// Field mappings, sent as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Value>,
    /// Index aliases, sent as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Value>,
    /// Extra index-level settings (analysis, refresh interval, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Primary key attribute; the client default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    /// Attributes full-text search looks at, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searchable_attributes: Vec<String>,
    /// Attributes usable in filters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filterable_attributes: Vec<String>,
    /// Attributes usable for sorting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sortable_attributes: Vec<String>,
    /// Attributes returned in hits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displayed_attributes: Vec<String>,
}

impl IndexSettings {
    /// Engine defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shard count.
    pub fn shards(mut self, shards: u32) -> Self {
        self.number_of_shards = Some(shards);
        self
    }

    /// Sets the replica count.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.number_of_replicas = Some(replicas);
        self
    }

    /// Sets the mappings.
    pub fn mappings(mut self, mappings: Value) -> Self {
        self.mappings = Some(mappings);
        self
    }

    /// Sets the aliases.
    pub fn aliases(mut self, aliases: Value) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Sets the primary key attribute.
    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    /// Sets the searchable attributes.
    pub fn searchable<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the filterable attributes.
    pub fn filterable<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filterable_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the sortable attributes.
    pub fn sortable<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// True when any Meilisearch attribute list is set.
    pub fn has_attribute_settings(&self) -> bool {
        !self.searchable_attributes.is_empty()
            || !self.filterable_attributes.is_empty()
            || !self.sortable_attributes.is_empty()
            || !self.displayed_attributes.is_empty()
    }
}

/// When a write becomes visible to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refresh {
    /// Return as soon as the engine accepted the write.
    #[default]
    False,
    /// Make the write visible before returning.
    True,
    /// Wait for the next natural refresh before returning.
    WaitFor,
}

impl Refresh {
    /// Value of the `refresh` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Refresh::False => "false",
            Refresh::True => "true",
            Refresh::WaitFor => "wait_for",
        }
    }

    /// True when the caller asked to see the write before returning.
    pub fn blocks(&self) -> bool {
        !matches!(self, Refresh::False)
    }
}

/// Options for `index_with_options`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Visibility before returning.
    pub refresh: Refresh,
    /// Shard routing key (Elasticsearch).
    pub routing: Option<String>,
    /// Fail with a conflict if the id already exists.
    pub create_only: bool,
    /// Optimistic concurrency: expected sequence number and primary term.
    pub if_seq_no: Option<i64>,
    /// Expected primary term; used with `if_seq_no`.
    pub if_primary_term: Option<i64>,
}

impl IndexOptions {
    /// Defaults: no refresh, no routing, no preconditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `refresh`.
    pub fn refresh(mut self, refresh: Refresh) -> Self {
        self.refresh = refresh;
        self
    }

    /// Sets `routing`.
    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Fails instead of replacing an existing document.
    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    /// Only writes if the document is still at this version.
    pub fn if_seq_no_primary_term(mut self, seq_no: i64, primary_term: i64) -> Self {
        self.if_seq_no = Some(seq_no);
        self.if_primary_term = Some(primary_term);
        self
    }
}
