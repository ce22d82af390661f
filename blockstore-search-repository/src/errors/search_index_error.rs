//! Search index error types.
//!
//! This module defines the error types that can occur during search index operations
//! and classifies them into transient (worth retrying) and permanent failures.

use thiserror::Error;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., an invalid request built by the caller).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The search engine asked the client to slow down (HTTP 429).
    #[error("Throttled: {0}")]
    Throttled(String),

    /// The search engine failed while handling the request (HTTP 5xx).
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// The search engine refused the request (HTTP 4xx other than 429).
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// A document does not fit the index mapping.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The response body could not be interpreted.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The client was closed.
    #[error("Search index client is closed")]
    Closed,
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a schema mismatch error.
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Classify a non-success HTTP response.
    ///
    /// # Arguments
    ///
    /// * `status` - The HTTP status code returned by the search engine
    /// * `body` - The response body, used as the error message
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            408 => Self::Timeout(message),
            429 => Self::Throttled(message),
            500..=599 => Self::ServerError { status, message },
            400 if is_mapping_failure(&message) => Self::SchemaMismatch(message),
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether the same request may succeed if sent again.
    ///
    /// Connection failures, timeouts, throttling and server errors are
    /// transient. Everything else fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_)
                | Self::Timeout(_)
                | Self::Throttled(_)
                | Self::ServerError { .. }
        )
    }
}

impl From<opensearch::Error> for SearchIndexError {
    fn from(e: opensearch::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout(e.to_string());
        }
        match e.status_code() {
            Some(status) => Self::from_status(status.as_u16(), e.to_string()),
            None => Self::ConnectionError(e.to_string()),
        }
    }
}

fn is_mapping_failure(body: &str) -> bool {
    body.contains("mapper_parsing_exception")
        || body.contains("strict_dynamic_mapping_exception")
        || body.contains("illegal_argument_exception")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            SearchIndexError::from_status(429, "slow down"),
            SearchIndexError::Throttled(_)
        ));
        assert!(matches!(
            SearchIndexError::from_status(503, "unavailable"),
            SearchIndexError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            SearchIndexError::from_status(408, "timeout"),
            SearchIndexError::Timeout(_)
        ));
        assert!(matches!(
            SearchIndexError::from_status(400, r#"{"type":"mapper_parsing_exception"}"#),
            SearchIndexError::SchemaMismatch(_)
        ));
        assert!(matches!(
            SearchIndexError::from_status(403, "forbidden"),
            SearchIndexError::Rejected { status: 403, .. }
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(SearchIndexError::connection("refused").is_transient());
        assert!(SearchIndexError::timeout("elapsed").is_transient());
        assert!(SearchIndexError::from_status(429, "").is_transient());
        assert!(SearchIndexError::from_status(502, "").is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!SearchIndexError::validation("bad").is_transient());
        assert!(!SearchIndexError::schema_mismatch("bad field").is_transient());
        assert!(!SearchIndexError::parse("bad json").is_transient());
        assert!(!SearchIndexError::from_status(404, "no index").is_transient());
        assert!(!SearchIndexError::Closed.is_transient());
    }
}
