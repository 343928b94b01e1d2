//! Error taxonomy shared by the pipeline, storage and history query.

use thiserror::Error;

/// Failure to obtain current conditions from the upstream provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream returned status {status}: {}", truncate_body(.body))]
    Status { status: u16, body: String },

    #[error("upstream request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("upstream timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

/// Failure while opening, reading or writing the observation store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored timestamp '{0}' is not a valid date-time")]
    CorruptTimestamp(String),

    #[error("storage task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}

/// Rejection or failure of a history query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid token")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QueryError {
    /// Whether the caller, rather than the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::BadRequest(_))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_keeps_full_body_but_truncates_display() {
        let body = "x".repeat(500);
        let err = FetchError::Status {
            status: 401,
            body: body.clone(),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("upstream returned status 401: "));
        assert!(msg.ends_with("..."));
        assert!(msg.len() < body.len());

        match err {
            FetchError::Status { body: kept, .. } => assert_eq!(kept.len(), 500),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "ї".repeat(300);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(QueryError::Unauthorized.is_client_error());
        assert!(QueryError::BadRequest("bad day".into()).is_client_error());
        assert!(!QueryError::Storage(StorageError::Task("boom".into())).is_client_error());
    }

    #[test]
    fn unauthorized_message_matches_wire_text() {
        assert_eq!(QueryError::Unauthorized.to_string(), "Invalid token");
    }
}
