//! Bulk request and normalized bulk result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The action of one bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    /// Create or replace.
    Index,
    /// Create; fails if the id exists (where the engine supports it).
    Create,
    /// Partial update of an existing document.
    Update,
    /// Remove by id.
    Delete,
}

impl BulkAction {
    /// Elasticsearch action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Create => "create",
            BulkAction::Update => "update",
            BulkAction::Delete => "delete",
        }
    }
}

impl std::fmt::Display for BulkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One operation in a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperation {
    /// What to do.
    pub action: BulkAction,
    /// Target index.
    pub index: String,
    /// Document id; empty lets the backend assign one.
    #[serde(default)]
    pub id: String,
    /// Document body; absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
    /// Shard routing key (Elasticsearch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<String>,
}

impl BulkOperation {
    /// Create or replace.
    pub fn index(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        Self::with_document(BulkAction::Index, index, id, document)
    }

    /// Create only.
    pub fn create(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        Self::with_document(BulkAction::Create, index, id, document)
    }

    /// Partial update; `document` holds only the changed fields.
    pub fn update(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        Self::with_document(BulkAction::Update, index, id, document)
    }

    /// Delete by id.
    pub fn delete(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            action: BulkAction::Delete,
            index: index.into(),
            id: id.into(),
            document: None,
            routing: None,
        }
    }

    /// Sets the routing key.
    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    fn with_document(
        action: BulkAction,
        index: impl Into<String>,
        id: impl Into<String>,
        document: Value,
    ) -> Self {
        Self {
            action,
            index: index.into(),
            id: id.into(),
            document: Some(document),
            routing: None,
        }
    }
}

/// Outcome of one bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    /// Action of the operation.
    pub action: BulkAction,
    /// Index of the operation.
    pub index: String,
    /// Document id; the assigned one when the operation had none.
    pub id: String,
    /// HTTP-style status for this item.
    pub status: u16,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkItem {
    /// A successful outcome for `op`.
    pub fn success(op: &BulkOperation, id: impl Into<String>, status: u16) -> Self {
        Self {
            action: op.action,
            index: op.index.clone(),
            id: id.into(),
            status,
            error: None,
        }
    }

    /// A failed outcome for `op`.
    pub fn failure(op: &BulkOperation, status: u16, error: impl Into<String>) -> Self {
        Self {
            action: op.action,
            index: op.index.clone(),
            id: op.id.clone(),
            status,
            error: Some(error.into()),
        }
    }

    /// True for a 2xx status without an error.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Normalized bulk response: one item per submitted operation, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    /// One item per operation.
    pub items: Vec<BulkItem>,
    /// Items that succeeded.
    pub success_count: usize,
    /// Items that failed.
    pub error_count: usize,
    /// Time the request took.
    pub took_ms: u64,
}

impl BulkResult {
    /// Builds a result and derives the counters from `items`.
    pub fn from_items(items: Vec<BulkItem>, took_ms: u64) -> Self {
        let success_count = items.iter().filter(|item| item.is_success()).count();
        let error_count = items.len() - success_count;
        Self {
            items,
            success_count,
            error_count,
            took_ms,
        }
    }

    /// True when any item failed.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Items that failed.
    pub fn failed(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|item| !item.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_derived_from_items() {
        let ops = [
            BulkOperation::index("p", "1", json!({})),
            BulkOperation::index("p", "2", json!({})),
            BulkOperation::delete("p", "3"),
        ];
        let items = vec![
            BulkItem::success(&ops[0], "1", 201),
            BulkItem::failure(&ops[1], 400, "mapper_parsing_exception"),
            BulkItem::success(&ops[2], "3", 200),
        ];
        let result = BulkResult::from_items(items, 5);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.error_count, 1);
        assert!(result.has_errors());
        assert_eq!(result.failed().next().unwrap().id, "2");
    }

    #[test]
    fn test_bulk_operation_from_json() {
        let op: BulkOperation = serde_json::from_value(json!({
            "action": "update",
            "index": "products",
            "id": "9",
            "document": { "price": 10 }
        }))
        .unwrap();
        assert_eq!(op, BulkOperation::update("products", "9", json!({ "price": 10 })));
    }
}
