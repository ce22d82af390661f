//! Request and result types for the read path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A resolved full-text search request.
///
/// The query facade fills in defaults from the schema descriptor before the
/// request reaches the index, so providers execute it as given.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Query text. Empty or `*` matches every document.
    pub text: String,
    /// Facetable fields to return counts for.
    pub facets: Vec<String>,
    /// Maximum number of hits to return.
    pub top: usize,
    /// Maximum number of buckets per facet.
    pub facet_size: usize,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>, top: usize) -> Self {
        Self {
            text: text.into(),
            facets: Vec::new(),
            top,
            facet_size: 10,
        }
    }

    pub fn with_facets(mut self, facets: Vec<String>) -> Self {
        self.facets = facets;
        self
    }

    pub fn with_facet_size(mut self, facet_size: usize) -> Self {
        self.facet_size = facet_size;
        self
    }

    /// Whether the text matches everything.
    pub fn is_match_all(&self) -> bool {
        let text = self.text.trim();
        text.is_empty() || text == "*"
    }
}

/// A single matched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    pub score: f64,
    pub document: Map<String, Value>,
}

/// Number of matched documents sharing one facet value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// Matched documents plus total count and facet counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Total number of matching documents, not just the returned page.
    pub total: u64,
    pub hits: Vec<SearchHit>,
    /// Facet buckets keyed by field name, highest count first.
    pub facets: BTreeMap<String, Vec<FacetCount>>,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A resolved suggest request.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestRequest {
    pub prefix: String,
    /// Suggest-eligible fields to match the prefix against.
    pub fields: Vec<String>,
    /// Tolerate small typos in the prefix.
    pub fuzzy: bool,
    pub top: usize,
}

/// One suggestion: the matched field text and the document it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub key: String,
    pub document: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestResult {
    pub suggestions: Vec<Suggestion>,
}
