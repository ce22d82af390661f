//! In-memory search index.
//!
//! `InMemorySearchIndex` keeps every index as a map from document key to JSON
//! body. It follows the same action semantics as the OpenSearch provider
//! (insert-only upload, create-or-replace merge, delete of a missing key
//! succeeds) and a simplified query model: every query term must match a
//! searchable field, facets count values over all matches, and suggestions
//! match word prefixes with at most one edit when fuzzy.
//!
//! Used by tests and local development; nothing is persisted.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BulkItemResult, BulkResponse};
use blockstore_search_shared::{
    FacetCount, FieldType, IndexAction, IndexActionKind, IndexSchemaDescriptor, SearchHit,
    SearchRequest, SearchResult, SuggestRequest, SuggestResult, Suggestion,
};

type StoredIndex = BTreeMap<String, Map<String, Value>>;

#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    indexes: Mutex<HashMap<String, StoredIndex>>,
    closed: AtomicBool,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored body of one document, if present.
    pub async fn get(&self, index: &str, key: &str) -> Option<Map<String, Value>> {
        let indexes = self.indexes.lock().await;
        indexes.get(index).and_then(|docs| docs.get(key).cloned())
    }

    /// Every stored document of an index, ordered by key.
    pub async fn documents(&self, index: &str) -> Vec<(String, Map<String, Value>)> {
        let indexes = self.indexes.lock().await;
        indexes
            .get(index)
            .map(|docs| docs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub async fn index_exists(&self, index: &str) -> bool {
        self.indexes.lock().await.contains_key(index)
    }

    fn ensure_open(&self) -> Result<(), SearchIndexError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SearchIndexError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchIndex {
    async fn ensure_index(&self, schema: &IndexSchemaDescriptor) -> Result<(), SearchIndexError> {
        self.ensure_open()?;
        self.indexes
            .lock()
            .await
            .entry(schema.name().to_string())
            .or_default();
        Ok(())
    }

    async fn submit_batch(
        &self,
        schema: &IndexSchemaDescriptor,
        actions: &[IndexAction],
    ) -> Result<BulkResponse, SearchIndexError> {
        self.ensure_open()?;

        let mut indexes = self.indexes.lock().await;
        let docs = indexes.entry(schema.name().to_string()).or_default();

        let items = actions
            .iter()
            .map(|action| apply_action(docs, action))
            .collect();

        debug!(index = %schema.name(), count = actions.len(), "Applied in-memory batch");
        Ok(BulkResponse::new(items))
    }

    async fn search(
        &self,
        schema: &IndexSchemaDescriptor,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchIndexError> {
        self.ensure_open()?;

        let indexes = self.indexes.lock().await;
        let Some(docs) = indexes.get(schema.name()) else {
            return Err(SearchIndexError::from_status(
                404,
                format!("no such index [{}]", schema.name()),
            ));
        };

        let terms: Vec<String> = if request.is_match_all() {
            Vec::new()
        } else {
            request
                .text
                .split_whitespace()
                .map(str::to_lowercase)
                .collect()
        };

        let mut matches: Vec<(String, f64, &Map<String, Value>)> = docs
            .iter()
            .filter_map(|(key, body)| {
                score(schema, body, &terms).map(|score| (key.clone(), score, body))
            })
            .collect();
        matches.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut facets = BTreeMap::new();
        for facet in &request.facets {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for (_, _, body) in &matches {
                if let Some(value) = body.get(facet).and_then(facet_value) {
                    *counts.entry(value).or_default() += 1;
                }
            }
            let mut buckets: Vec<FacetCount> = counts
                .into_iter()
                .map(|(value, count)| FacetCount { value, count })
                .collect();
            buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
            buckets.truncate(request.facet_size);
            facets.insert(facet.clone(), buckets);
        }

        let total = matches.len() as u64;
        let hits = matches
            .into_iter()
            .take(request.top)
            .map(|(key, score, body)| SearchHit {
                key,
                score,
                document: body.clone(),
            })
            .collect();

        Ok(SearchResult {
            total,
            hits,
            facets,
        })
    }

    async fn suggest(
        &self,
        schema: &IndexSchemaDescriptor,
        request: &SuggestRequest,
    ) -> Result<SuggestResult, SearchIndexError> {
        self.ensure_open()?;

        let prefix: Vec<char> = request.prefix.trim().to_lowercase().chars().collect();
        if prefix.is_empty() {
            return Ok(SuggestResult::default());
        }

        let indexes = self.indexes.lock().await;
        let Some(docs) = indexes.get(schema.name()) else {
            return Ok(SuggestResult::default());
        };

        // (exact, key, text, body): exact prefix matches rank before fuzzy ones
        let mut candidates: Vec<(bool, &String, String, &Map<String, Value>)> = Vec::new();
        for (key, body) in docs {
            let best = request
                .fields
                .iter()
                .filter_map(|field| body.get(field).and_then(|v| v.as_str()))
                .filter_map(|text| {
                    prefix_match(text, &prefix, request.fuzzy).map(|exact| (exact, text))
                })
                .max_by_key(|(exact, _)| *exact);

            if let Some((exact, text)) = best {
                candidates.push((exact, key, text.to_string(), body));
            }
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let suggestions = candidates
            .into_iter()
            .take(request.top)
            .map(|(_, key, text, body)| Suggestion {
                text,
                key: key.clone(),
                document: body.clone(),
            })
            .collect();

        Ok(SuggestResult { suggestions })
    }

    async fn count(&self, schema: &IndexSchemaDescriptor) -> Result<u64, SearchIndexError> {
        self.ensure_open()?;
        let indexes = self.indexes.lock().await;
        Ok(indexes
            .get(schema.name())
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        self.ensure_open()?;
        Ok(true)
    }

    async fn close(&self) -> Result<(), SearchIndexError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

fn apply_action(docs: &mut StoredIndex, action: &IndexAction) -> BulkItemResult {
    let key = action.key().to_string();
    match action.kind {
        IndexActionKind::Upload => {
            if docs.contains_key(&key) {
                return BulkItemResult::failed(
                    key,
                    action.kind,
                    409,
                    "version_conflict_engine_exception: document already exists",
                );
            }
            docs.insert(key.clone(), json_body(action));
            BulkItemResult::ok(key, action.kind, 201)
        }
        IndexActionKind::MergeOrUpload => {
            let status = if docs.insert(key.clone(), json_body(action)).is_some() {
                200
            } else {
                201
            };
            BulkItemResult::ok(key, action.kind, status)
        }
        IndexActionKind::Delete => {
            let status = if docs.remove(&key).is_some() { 200 } else { 404 };
            BulkItemResult::ok(key, action.kind, status)
        }
    }
}

fn json_body(action: &IndexAction) -> Map<String, Value> {
    match action.document.to_json() {
        Value::Object(body) => body,
        _ => Map::new(),
    }
}

/// Score a document against the query terms, or `None` when a term is missing.
///
/// Keyword fields match a term exactly; text fields match any of their words.
fn score(schema: &IndexSchemaDescriptor, body: &Map<String, Value>, terms: &[String]) -> Option<f64> {
    if terms.is_empty() {
        return Some(1.0);
    }

    let mut total = 0.0;
    for term in terms {
        let mut hits = 0u32;
        for field in schema.fields().iter().filter(|f| f.searchable) {
            let Some(value) = body.get(&field.name).and_then(facet_value) else {
                continue;
            };
            let value = value.to_lowercase();
            let matched = match field.field_type {
                FieldType::Text => words(&value).any(|word| word == term.as_str()),
                _ => value == *term,
            };
            if matched {
                hits += 1;
            }
        }
        if hits == 0 {
            return None;
        }
        total += f64::from(hits);
    }
    Some(total)
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

fn facet_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether `text` has a word starting with `prefix`.
///
/// Returns `Some(true)` for an exact prefix match, `Some(false)` for a match
/// within one edit when `fuzzy` is set, and `None` otherwise.
fn prefix_match(text: &str, prefix: &[char], fuzzy: bool) -> Option<bool> {
    let lowered = text.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();

    let starts: Vec<usize> = (0..chars.len())
        .filter(|&i| chars[i].is_alphanumeric() && (i == 0 || !chars[i - 1].is_alphanumeric()))
        .collect();

    if starts.iter().any(|&i| chars[i..].starts_with(prefix)) {
        return Some(true);
    }
    if !fuzzy {
        return None;
    }

    let n = prefix.len();
    let fuzzy_hit = starts.iter().any(|&i| {
        let rest = &chars[i..];
        [n.saturating_sub(1), n, n + 1]
            .into_iter()
            .filter(|&len| len > 0 && len <= rest.len())
            .any(|len| within_one_edit(&rest[..len], prefix))
    });
    fuzzy_hit.then_some(false)
}

fn within_one_edit(a: &[char], b: &[char]) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if long.len() - short.len() > 1 {
        return false;
    }

    let mut i = 0;
    let mut j = 0;
    let mut edits = 0;
    while i < short.len() && j < long.len() {
        if short[i] == long[j] {
            i += 1;
            j += 1;
            continue;
        }
        edits += 1;
        if edits > 1 {
            return false;
        }
        if short.len() == long.len() {
            i += 1;
        }
        j += 1;
    }
    edits + (long.len() - j) + (short.len() - i) <= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_search_shared::schema::presets;
    use blockstore_search_shared::{Document, FieldValue};

    fn contract(address: &str, creator: &str, name: &str) -> Document {
        let mut fields = BTreeMap::new();
        fields.insert("address".to_string(), FieldValue::from(address));
        fields.insert("creator".to_string(), FieldValue::from(creator));
        fields.insert("name".to_string(), FieldValue::from(name));
        Document::new("id", address, fields)
    }

    async fn seeded() -> (InMemorySearchIndex, IndexSchemaDescriptor) {
        let index = InMemorySearchIndex::new();
        let schema = presets::contracts();
        index.ensure_index(&schema).await.unwrap();
        index
            .submit_batch(
                &schema,
                &[
                    IndexAction::merge_or_upload(contract("0x01", "0xaa", "Tether USD")),
                    IndexAction::merge_or_upload(contract("0x02", "0xaa", "USD Coin")),
                    IndexAction::merge_or_upload(contract("0x03", "0xbb", "Wrapped Ether")),
                ],
            )
            .await
            .unwrap();
        (index, schema)
    }

    #[tokio::test]
    async fn test_upload_conflicts_on_existing_key() {
        let (index, schema) = seeded().await;

        let response = index
            .submit_batch(
                &schema,
                &[
                    IndexAction::upload(contract("0x01", "0xcc", "Other")),
                    IndexAction::upload(contract("0x04", "0xcc", "Dai")),
                ],
            )
            .await
            .unwrap();

        assert_eq!(response.succeeded(), 1);
        assert_eq!(response.failures()[0].status, 409);
        // The existing document is untouched
        let stored = index.get(schema.name(), "0x01").await.unwrap();
        assert_eq!(stored["name"], "Tether USD");
    }

    #[tokio::test]
    async fn test_merge_or_upload_is_idempotent() {
        let (index, schema) = seeded().await;
        let before = index.documents(schema.name()).await;

        let action = IndexAction::merge_or_upload(contract("0x01", "0xaa", "Tether USD"));
        index.submit_batch(&schema, &[action.clone()]).await.unwrap();
        index.submit_batch(&schema, &[action]).await.unwrap();

        assert_eq!(index.documents(schema.name()).await, before);
    }

    #[tokio::test]
    async fn test_merge_or_upload_replaces() {
        let (index, schema) = seeded().await;

        let mut fields = BTreeMap::new();
        fields.insert("address".to_string(), FieldValue::from("0x01"));
        let replacement = Document::new("id", "0x01", fields);
        index
            .submit_batch(&schema, &[IndexAction::merge_or_upload(replacement)])
            .await
            .unwrap();

        // Replace, not field-level merge
        let stored = index.get(schema.name(), "0x01").await.unwrap();
        assert!(stored.get("name").is_none());
        assert_eq!(index.count(&schema).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_key_succeeds() {
        let (index, schema) = seeded().await;

        let response = index
            .submit_batch(
                &schema,
                &[
                    IndexAction::delete(contract("0x03", "", "")),
                    IndexAction::delete(contract("0x99", "", "")),
                ],
            )
            .await
            .unwrap();

        assert!(!response.has_failures());
        assert_eq!(response.items[1].status, 404);
        assert_eq!(index.count(&schema).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_requires_every_term() {
        let (index, schema) = seeded().await;

        let result = index
            .search(&schema, &SearchRequest::new("usd coin", 20))
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.hits[0].key, "0x02");

        let result = index
            .search(&schema, &SearchRequest::new("usd", 20))
            .await
            .unwrap();
        assert_eq!(result.total, 2);
    }

    #[tokio::test]
    async fn test_search_facets_and_paging() {
        let (index, schema) = seeded().await;

        let request = SearchRequest::new("*", 1).with_facets(vec!["creator".to_string()]);
        let result = index.search(&schema, &request).await.unwrap();

        // Total and facets cover every match, hits only the page
        assert_eq!(result.total, 3);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(
            result.facets["creator"],
            vec![
                FacetCount {
                    value: "0xaa".to_string(),
                    count: 2
                },
                FacetCount {
                    value: "0xbb".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_search_missing_index() {
        let index = InMemorySearchIndex::new();
        let err = index
            .search(&presets::blocks(), &SearchRequest::new("x", 20))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_suggest_prefix_and_fuzzy() {
        let (index, schema) = seeded().await;
        let mut request = SuggestRequest {
            prefix: "teth".to_string(),
            fields: vec!["name".to_string()],
            fuzzy: false,
            top: 8,
        };

        let result = index.suggest(&schema, &request).await.unwrap();
        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].text, "Tether USD");

        // One typo
        request.prefix = "tethr".to_string();
        assert!(index.suggest(&schema, &request).await.unwrap().suggestions.is_empty());
        request.fuzzy = true;
        let result = index.suggest(&schema, &request).await.unwrap();
        assert_eq!(result.suggestions[0].key, "0x01");
    }

    #[tokio::test]
    async fn test_suggest_matches_later_words() {
        let (index, schema) = seeded().await;
        let request = SuggestRequest {
            prefix: "eth".to_string(),
            fields: vec!["name".to_string()],
            fuzzy: false,
            top: 8,
        };

        let result = index.suggest(&schema, &request).await.unwrap();
        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].text, "Wrapped Ether");
    }

    #[tokio::test]
    async fn test_closed_index_rejects_calls() {
        let (index, schema) = seeded().await;
        index.close().await.unwrap();

        assert_eq!(index.count(&schema).await, Err(SearchIndexError::Closed));
        assert_eq!(index.health_check().await, Err(SearchIndexError::Closed));
    }

    #[test]
    fn test_within_one_edit() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert!(within_one_edit(&chars("tether"), &chars("tether")));
        assert!(within_one_edit(&chars("tethr"), &chars("tethe")));
        assert!(within_one_edit(&chars("teher"), &chars("tether")));
        assert!(!within_one_edit(&chars("tehr"), &chars("tether")));
    }
}
