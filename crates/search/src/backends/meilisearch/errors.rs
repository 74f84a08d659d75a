//! Meilisearch error translation.
//!
//! Meilisearch errors are `{message, code, type, link}`; the `code` decides the
//! taxonomy kind and the HTTP status is the fallback.

use serde::Deserialize;

use crate::backends::{Target, status_error};
use crate::core::BackendKind;
use crate::error::{ClientError, ErrorKind};
use crate::transport::HttpResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct MeiliError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Taxonomy kind of a Meilisearch error code.
pub(crate) fn code_kind(code: &str) -> ErrorKind {
    match code {
        "index_not_found" => ErrorKind::IndexNotFound,
        "document_not_found" => ErrorKind::NotFound,
        "index_already_exists" | "index_primary_key_already_exists" => ErrorKind::Conflict,
        "missing_authorization_header" => ErrorKind::Unauthorized,
        "invalid_api_key" => ErrorKind::Forbidden,
        c if c.starts_with("invalid_search_") => ErrorKind::InvalidQuery,
        "invalid_document_filter" | "invalid_document_sort" => ErrorKind::InvalidQuery,
        c if c.starts_with("invalid_")
            || c.starts_with("missing_")
            || c == "bad_request"
            || c == "malformed_payload"
            || c == "primary_key_inference_failed"
            || c == "index_primary_key_multiple_candidates_found" =>
        {
            ErrorKind::BadRequest
        }
        _ => ErrorKind::Other,
    }
}

/// Maps a non-success response onto the error taxonomy.
pub(crate) fn translate(response: &HttpResponse, target: Target<'_>) -> ClientError {
    let status = response.status;
    let (code, message) = match serde_json::from_slice::<MeiliError>(&response.body) {
        Ok(error) if !error.message.is_empty() || error.code.is_some() => {
            (error.code, error.message)
        }
        _ if response.body.is_empty() => (None, format!("status {}", status)),
        _ => (None, response.text()),
    };

    let Some(code) = code else {
        return status_error(BackendKind::Meilisearch, status, None, message, target);
    };
    match code_kind(&code) {
        ErrorKind::IndexNotFound => ClientError::IndexNotFound {
            index: target.index_name(),
        },
        ErrorKind::NotFound => ClientError::NotFound {
            index: target.index_name(),
            id: target.id.unwrap_or_default().to_string(),
        },
        ErrorKind::Conflict => ClientError::Conflict { message },
        ErrorKind::InvalidQuery => ClientError::InvalidQuery { message },
        ErrorKind::BadRequest => ClientError::BadRequest { message },
        ErrorKind::Unauthorized => ClientError::Unauthorized { message },
        ErrorKind::Forbidden => ClientError::Forbidden { message },
        _ => status_error(BackendKind::Meilisearch, status, Some(code), message, target),
    }
}
