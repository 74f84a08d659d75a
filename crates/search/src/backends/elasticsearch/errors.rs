//! Elasticsearch error translation.

use serde::Deserialize;
use serde_json::Value;

use crate::backends::{Target, status_error};
use crate::core::BackendKind;
use crate::error::ClientError;
use crate::transport::HttpResponse;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        #[serde(rename = "type")]
        error_type: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        index: Option<String>,
    },
    Message(String),
    Other(Value),
}

/// Maps a non-success response onto the error taxonomy.
///
/// The `{error:{type,reason}}` body wins; the HTTP status is the fallback.
pub(crate) fn translate(response: &HttpResponse, target: Target<'_>) -> ClientError {
    let status = response.status;
    let (error_type, reason, error_index) =
        match serde_json::from_slice::<ErrorEnvelope>(&response.body) {
            Ok(ErrorEnvelope {
                error:
                    Some(ErrorBody::Detailed {
                        error_type,
                        reason,
                        index,
                    }),
            }) => (Some(error_type), reason, index),
            Ok(ErrorEnvelope {
                error: Some(ErrorBody::Message(message)),
            }) => (None, Some(message), None),
            Ok(ErrorEnvelope {
                error: Some(ErrorBody::Other(value)),
            }) => (None, Some(value.to_string()), None),
            _ => (None, None, None),
        };

    let index = error_index.unwrap_or_else(|| target.index_name());
    let reason = match reason {
        Some(reason) => reason,
        None if response.body.is_empty() => format!("status {}", status),
        None => response.text(),
    };
    let message = match error_type {
        Some(ref error_type) => format!("{}: {}", error_type, reason),
        None => reason.clone(),
    };

    match error_type.as_deref() {
        Some("index_not_found_exception") => ClientError::IndexNotFound { index },
        Some("version_conflict_engine_exception" | "resource_already_exists_exception") => {
            ClientError::Conflict { message }
        }
        Some("document_missing_exception") => ClientError::NotFound {
            index,
            id: target.id.unwrap_or_default().to_string(),
        },
        Some(
            "parsing_exception"
            | "query_shard_exception"
            | "x_content_parse_exception"
            | "query_parsing_exception",
        ) => ClientError::InvalidQuery { message },
        Some("search_phase_execution_exception") if status == 400 => {
            ClientError::InvalidQuery { message }
        }
        _ => status_error(BackendKind::Elasticsearch, status, error_type.clone(), reason, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse::new(status, serde_json::to_vec(&body).unwrap())
    }

    #[test]
    fn test_index_not_found() {
        let err = translate(
            &response(
                404,
                json!({
                    "error": {
                        "type": "index_not_found_exception",
                        "reason": "no such index [products]",
                        "index": "products"
                    },
                    "status": 404
                }),
            ),
            Target::document("products", "1"),
        );
        assert!(matches!(err, ClientError::IndexNotFound { ref index } if index == "products"));
    }

    #[test]
    fn test_missing_document_without_envelope() {
        let err = translate(
            &response(404, json!({ "_index": "products", "_id": "9", "found": false })),
            Target::document("products", "9"),
        );
        assert!(matches!(err, ClientError::NotFound { ref id, .. } if id == "9"));
    }

    #[test]
    fn test_version_conflict() {
        let err = translate(
            &response(
                409,
                json!({ "error": { "type": "version_conflict_engine_exception", "reason": "[1]: version conflict" } }),
            ),
            Target::document("products", "1"),
        );
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_parse_errors_are_invalid_query() {
        for error_type in ["parsing_exception", "query_shard_exception", "x_content_parse_exception"] {
            let err = translate(
                &response(400, json!({ "error": { "type": error_type, "reason": "bad" } })),
                Target::index("products"),
            );
            assert_eq!(err.kind(), ErrorKind::InvalidQuery, "{}", error_type);
        }
    }

    #[test]
    fn test_status_fallbacks() {
        let cases = [
            (400, ErrorKind::BadRequest),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (408, ErrorKind::Timeout),
            (409, ErrorKind::Conflict),
        ];
        for (status, kind) in cases {
            let err = translate(&HttpResponse::new(status, ""), Target::index("products"));
            assert_eq!(err.kind(), kind, "status {}", status);
        }
    }

    #[test]
    fn test_string_error_body() {
        let err = translate(
            &response(405, json!({ "error": "Incorrect HTTP method for uri", "status": 405 })),
            Target::none(),
        );
        match err {
            ClientError::Backend(backend) => {
                assert_eq!(backend.status, 405);
                assert!(backend.reason.contains("Incorrect HTTP method"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_error_preserves_type_and_reason() {
        let err = translate(
            &response(
                500,
                json!({ "error": { "type": "illegal_state_exception", "reason": "shard failure" } }),
            ),
            Target::index("products"),
        );
        let message = err.to_string();
        assert!(message.contains("illegal_state_exception"));
        assert!(message.contains("shard failure"));
        assert!(message.contains("500"));
    }
}
