//! NDJSON bulk encoding and per-item reconciliation.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{ClientError, ClientResult};
use crate::types::{BulkAction, BulkItem, BulkOperation};

/// An encoded `_bulk` body plus the bookkeeping needed to map the response back.
#[derive(Debug)]
pub(crate) struct EncodedBulk {
    pub body: Vec<u8>,
    /// Input positions of the operations that were sent, in send order.
    pub sent: Vec<usize>,
    /// Items for operations rejected before sending, by input position.
    pub rejected: Vec<Option<BulkItem>>,
}

impl EncodedBulk {
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

/// Encodes operations as NDJSON action/document pairs.
///
/// Operations that cannot be encoded (index/create/update without a document)
/// get a local 400 item and are left out of the request.
pub(crate) fn encode(operations: &[BulkOperation]) -> ClientResult<EncodedBulk> {
    let mut body = Vec::new();
    let mut sent = Vec::with_capacity(operations.len());
    let mut rejected = vec![None; operations.len()];

    for (position, op) in operations.iter().enumerate() {
        let document = match (op.action, &op.document) {
            (BulkAction::Delete, _) => None,
            (BulkAction::Update, Some(doc)) => Some(json!({ "doc": doc })),
            (_, Some(doc)) => Some(doc.clone()),
            (_, None) => {
                rejected[position] = Some(BulkItem::failure(
                    op,
                    400,
                    format!("{} operation requires a document", op.action),
                ));
                continue;
            }
        };
        if op.id.is_empty() && matches!(op.action, BulkAction::Update | BulkAction::Delete) {
            rejected[position] = Some(BulkItem::failure(
                op,
                400,
                format!("{} operation requires an id", op.action),
            ));
            continue;
        }

        let mut meta = Map::new();
        meta.insert("_index".to_string(), json!(op.index));
        if !op.id.is_empty() {
            meta.insert("_id".to_string(), json!(op.id));
        }
        if let Some(ref routing) = op.routing {
            meta.insert("routing".to_string(), json!(routing));
        }
        write_line(&mut body, &json!({ op.action.as_str(): meta }))?;
        if let Some(ref document) = document {
            write_line(&mut body, document)?;
        }
        sent.push(position);
    }

    Ok(EncodedBulk {
        body,
        sent,
        rejected,
    })
}

fn write_line(body: &mut Vec<u8>, value: &Value) -> ClientResult<()> {
    serde_json::to_writer(&mut *body, value)?;
    body.push(b'\n');
    Ok(())
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ItemResult {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Merges the `_bulk` response with locally rejected items, in input order.
///
/// Returns the items and the engine-reported `took`. Sent operations with no
/// matching response item get a synthesized 500 item, so the item count
/// always equals the operation count.
pub(crate) fn reconcile(
    operations: &[BulkOperation],
    encoded: EncodedBulk,
    response_body: &[u8],
) -> ClientResult<(Vec<BulkItem>, u64)> {
    let response: BulkResponse = serde_json::from_slice(response_body).map_err(|e| {
        ClientError::serialization(format!("invalid bulk response: {}", e))
    })?;

    let mut items = encoded.rejected;
    let mut returned = response.items.into_iter();
    for position in encoded.sent {
        let op = &operations[position];
        let item = match returned.next() {
            Some(entry) => item_from_entry(op, entry),
            None => BulkItem::failure(op, 500, "no result returned for this operation"),
        };
        items[position] = Some(item);
    }

    let items = items
        .into_iter()
        .zip(operations)
        .map(|(item, op)| {
            item.unwrap_or_else(|| BulkItem::failure(op, 500, "operation was not processed"))
        })
        .collect();
    Ok((items, response.took))
}

fn item_from_entry(op: &BulkOperation, entry: Map<String, Value>) -> BulkItem {
    // Each entry is keyed by its action: {"index": {...}}
    let Some((_, result)) = entry.into_iter().next() else {
        return BulkItem::failure(op, 500, "empty bulk response item");
    };
    let result: ItemResult = match serde_json::from_value(result) {
        Ok(result) => result,
        Err(e) => return BulkItem::failure(op, 500, format!("invalid bulk response item: {}", e)),
    };

    match result.error {
        Some(error) => {
            let mut item = BulkItem::failure(op, result.status, describe_error(&error));
            if let Some(id) = result.id {
                item.id = id;
            }
            item
        }
        None if (200..300).contains(&result.status) => {
            BulkItem::success(op, result.id.unwrap_or_else(|| op.id.clone()), result.status)
        }
        None => BulkItem::failure(op, result.status, format!("status {}", result.status)),
    }
}

fn describe_error(error: &Value) -> String {
    match (error.get("type").and_then(Value::as_str), error.get("reason").and_then(Value::as_str)) {
        (Some(error_type), Some(reason)) => format!("{}: {}", error_type, reason),
        (Some(error_type), None) => error_type.to_string(),
        _ => error.to_string(),
    }
}
