//! Index actions submitted in bulk batches.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// What the remote index should do with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexActionKind {
    /// Insert a new document. An existing document with the same key is a
    /// per-item failure reported by the index.
    Upload,
    /// Create the document or fully replace the existing one with the same key.
    #[default]
    MergeOrUpload,
    /// Remove the document with this key. Removing a missing key succeeds.
    Delete,
}

impl IndexActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexActionKind::Upload => "upload",
            IndexActionKind::MergeOrUpload => "merge_or_upload",
            IndexActionKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for IndexActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document paired with the action to apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexAction {
    pub kind: IndexActionKind,
    pub document: Document,
}

impl IndexAction {
    pub fn new(kind: IndexActionKind, document: Document) -> Self {
        Self { kind, document }
    }

    pub fn upload(document: Document) -> Self {
        Self::new(IndexActionKind::Upload, document)
    }

    pub fn merge_or_upload(document: Document) -> Self {
        Self::new(IndexActionKind::MergeOrUpload, document)
    }

    pub fn delete(document: Document) -> Self {
        Self::new(IndexActionKind::Delete, document)
    }

    /// Key of the wrapped document.
    pub fn key(&self) -> &str {
        self.document.key()
    }
}
