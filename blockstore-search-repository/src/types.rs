//! Response types for bulk submissions.

use blockstore_search_shared::IndexActionKind;

/// Outcome of a single action within a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    /// Key of the document the action targeted.
    pub key: String,
    pub action: IndexActionKind,
    /// Per-item HTTP-style status reported by the index.
    pub status: u16,
    /// Reason the action was rejected, if it was.
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn ok(key: impl Into<String>, action: IndexActionKind, status: u16) -> Self {
        Self {
            key: key.into(),
            action,
            status,
            error: None,
        }
    }

    pub fn failed(
        key: impl Into<String>,
        action: IndexActionKind,
        status: u16,
        error: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            action,
            status,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item results of a bulk request, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    pub fn new(items: Vec<BulkItemResult>) -> Self {
        Self { items }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.succeeded()).count()
    }

    /// Items the index rejected.
    pub fn failures(&self) -> Vec<&BulkItemResult> {
        self.items.iter().filter(|item| !item.succeeded()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|item| !item.succeeded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_response_counts() {
        let response = BulkResponse::new(vec![
            BulkItemResult::ok("1", IndexActionKind::MergeOrUpload, 201),
            BulkItemResult::failed("2", IndexActionKind::Upload, 409, "version conflict"),
            BulkItemResult::ok("3", IndexActionKind::Delete, 404),
        ]);

        assert_eq!(response.total(), 3);
        assert_eq!(response.succeeded(), 2);
        assert!(response.has_failures());
        assert_eq!(response.failures()[0].key, "2");
    }
}
