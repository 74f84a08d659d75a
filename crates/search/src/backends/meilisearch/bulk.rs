//! Bulk grouping for Meilisearch.
//!
//! Meilisearch has no mixed-action batch endpoint. Operations are grouped by
//! `(index, family)` in order of first appearance and each group becomes one
//! request: add-or-replace for index and create, add-or-update for update,
//! delete-batch for delete.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::{BulkAction, BulkItem, BulkOperation};

use super::response::id_string;

/// Longest document id Meilisearch accepts.
pub(crate) const MAX_ID_LEN: usize = 511;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Replace,
    Update,
    Delete,
}

impl Family {
    fn of(action: BulkAction) -> Self {
        match action {
            BulkAction::Index | BulkAction::Create => Family::Replace,
            BulkAction::Update => Family::Update,
            BulkAction::Delete => Family::Delete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Replace => "replace",
            Family::Update => "update",
            Family::Delete => "delete",
        }
    }
}

/// One request worth of operations.
#[derive(Debug)]
pub(crate) struct Group<'a> {
    pub index: &'a str,
    pub family: Family,
    /// Input positions and resolved ids of the member operations.
    pub members: Vec<(usize, String)>,
    /// Documents for replace/update, ids for delete.
    pub payload: Vec<Value>,
}

#[derive(Debug)]
pub(crate) struct BulkPlan<'a> {
    pub groups: Vec<Group<'a>>,
    /// Items for operations rejected before sending, by input position.
    pub rejected: Vec<Option<BulkItem>>,
}

/// Meilisearch ids are 1 to 511 bytes of `[A-Za-z0-9_-]`.
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Puts `id` under `primary_key` unless the document already carries it.
///
/// An empty `id` takes the document's own key, or a fresh UUID when it has none.
/// Returns the id the document ends up with.
pub(crate) fn ensure_primary_key(
    document: &mut Map<String, Value>,
    primary_key: &str,
    id: &str,
) -> String {
    let existing = document.get(primary_key).and_then(id_string);
    match existing {
        Some(existing) if id.is_empty() || existing == id => existing,
        _ => {
            let id = if id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                id.to_string()
            };
            document.insert(primary_key.to_string(), Value::String(id.clone()));
            id
        }
    }
}

/// Validates and groups operations.
pub(crate) fn plan<'a>(operations: &'a [BulkOperation], primary_key: &str) -> BulkPlan<'a> {
    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut rejected = vec![None; operations.len()];

    for (position, op) in operations.iter().enumerate() {
        let family = Family::of(op.action);
        let (id, payload) = match family {
            Family::Delete => (op.id.clone(), Value::String(op.id.clone())),
            Family::Replace | Family::Update => {
                let mut document = match &op.document {
                    Some(Value::Object(document)) => document.clone(),
                    Some(_) => {
                        rejected[position] = Some(BulkItem::failure(
                            op,
                            400,
                            "document must be a JSON object",
                        ));
                        continue;
                    }
                    None => {
                        rejected[position] = Some(BulkItem::failure(
                            op,
                            400,
                            format!("{} operation requires a document", op.action),
                        ));
                        continue;
                    }
                };
                if family == Family::Update
                    && op.id.is_empty()
                    && !document.contains_key(primary_key)
                {
                    rejected[position] =
                        Some(BulkItem::failure(op, 400, "update operation requires an id"));
                    continue;
                }
                let id = ensure_primary_key(&mut document, primary_key, &op.id);
                (id, Value::Object(document))
            }
        };

        if !is_valid_id(&id) {
            rejected[position] = Some(BulkItem::failure(
                op,
                400,
                format!(
                    "invalid document id {:?}: expected 1 to {} characters of [A-Za-z0-9_-]",
                    id, MAX_ID_LEN
                ),
            ));
            continue;
        }

        let group = match groups
            .iter()
            .position(|g| g.index == op.index && g.family == family)
        {
            Some(i) => &mut groups[i],
            None => {
                groups.push(Group {
                    index: &op.index,
                    family,
                    members: Vec::new(),
                    payload: Vec::new(),
                });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        group.members.push((position, id));
        group.payload.push(payload);
    }

    BulkPlan { groups, rejected }
}
