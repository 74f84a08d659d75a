//! Search engine adapters.
//!
//! - [`elasticsearch`] - Elasticsearch and OpenSearch
//! - [`meilisearch`] - Meilisearch
//!
//! Both implement [`SearchClient`](crate::SearchClient) and map their native
//! errors onto [`ClientError`].

/// Elasticsearch and OpenSearch.
pub mod elasticsearch;
/// Meilisearch.
pub mod meilisearch;

use crate::core::BackendKind;
use crate::error::{BackendError, ClientError};

/// What a failed request was about, for error messages and not-found ids.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Target<'a> {
    pub index: Option<&'a str>,
    pub id: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub fn index(index: &'a str) -> Self {
        Self {
            index: Some(index),
            id: None,
        }
    }

    pub fn document(index: &'a str, id: &'a str) -> Self {
        Self {
            index: Some(index),
            id: Some(id),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn index_name(&self) -> String {
        self.index.unwrap_or_default().to_string()
    }
}

/// Maps an HTTP status onto the taxonomy when the body had nothing more specific.
///
/// Taxonomy variants get `"{error_type}: {reason}"` as their message; the
/// generic backend error keeps type and reason apart.
pub(crate) fn status_error(
    backend: BackendKind,
    status: u16,
    error_type: Option<String>,
    reason: String,
    target: Target<'_>,
) -> ClientError {
    let message = match error_type {
        Some(ref error_type) => format!("{}: {}", error_type, reason),
        None => reason.clone(),
    };
    match status {
        400 => ClientError::BadRequest { message },
        401 => ClientError::Unauthorized { message },
        403 => ClientError::Forbidden { message },
        404 => match target.id {
            Some(id) => ClientError::NotFound {
                index: target.index_name(),
                id: id.to_string(),
            },
            None => ClientError::IndexNotFound {
                index: target.index_name(),
            },
        },
        408 => ClientError::Timeout { message },
        409 => ClientError::Conflict { message },
        _ => BackendError {
            backend,
            status,
            error_type: error_type.unwrap_or_else(|| "unknown".to_string()),
            reason,
        }
        .into(),
    }
}

/// HTTP-style status for an error attributed to a bulk item.
pub(crate) fn item_status(err: &ClientError) -> u16 {
    use crate::error::ErrorKind;
    match err {
        ClientError::Backend(backend) => backend.status,
        ClientError::Cancelled => 499,
        _ => match err.kind() {
            ErrorKind::NotFound | ErrorKind::IndexNotFound => 404,
            ErrorKind::InvalidQuery | ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::Conflict => 409,
            ErrorKind::Timeout => 504,
            ErrorKind::ConnectionError => 503,
            ErrorKind::Other => 500,
        },
    }
}
