//! OpenSearch query builders and response parsers.
//!
//! This module provides functions to build OpenSearch request bodies from the
//! shared search/suggest requests and to turn the raw JSON responses back into
//! typed results.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::errors::SearchIndexError;
use crate::opensearch::index_config::facet_field;
use crate::types::{BulkItemResult, BulkResponse};
use blockstore_search_shared::{
    FacetCount, IndexAction, IndexActionKind, IndexSchemaDescriptor, SearchHit, SearchRequest,
    SearchResult, SuggestRequest, SuggestResult, Suggestion,
};

/// Bulk operation name for an action kind.
///
/// `create` refuses to overwrite an existing document, `index` creates or
/// replaces it.
pub fn bulk_operation(kind: IndexActionKind) -> &'static str {
    match kind {
        IndexActionKind::Upload => "create",
        IndexActionKind::MergeOrUpload => "index",
        IndexActionKind::Delete => "delete",
    }
}

/// Build the NDJSON lines of a bulk request.
///
/// Every action produces a header line; upload and merge actions are followed
/// by the document body.
pub fn build_bulk_lines(index: &str, actions: &[IndexAction]) -> Vec<Value> {
    let mut lines = Vec::with_capacity(actions.len() * 2);

    for action in actions {
        let mut header = Map::new();
        header.insert(
            bulk_operation(action.kind).to_string(),
            json!({ "_index": index, "_id": action.key() }),
        );
        lines.push(Value::Object(header));

        if action.kind != IndexActionKind::Delete {
            lines.push(action.document.to_json());
        }
    }

    lines
}

/// Build a full-text search body.
///
/// Every term of the query text must appear in some searchable field
/// (`cross_fields` with `operator: and`), not necessarily the same one. The
/// text is sent as typed: searchable keyword fields are mapped with a
/// lower-casing normalizer. Empty or `*` text matches every document. Each
/// requested facet becomes a `terms` aggregation.
pub fn build_search_query(schema: &IndexSchemaDescriptor, request: &SearchRequest) -> Value {
    let query = if request.is_match_all() {
        json!({ "match_all": {} })
    } else {
        let mut multi_match = Map::new();
        multi_match.insert("query".to_string(), json!(request.text.trim()));
        multi_match.insert("type".to_string(), json!("cross_fields"));
        multi_match.insert("operator".to_string(), json!("and"));
        multi_match.insert("lenient".to_string(), json!(true));
        let fields = schema.searchable_fields();
        if !fields.is_empty() {
            multi_match.insert("fields".to_string(), json!(fields));
        }
        json!({ "multi_match": multi_match })
    };

    let mut aggs = Map::new();
    for facet in &request.facets {
        aggs.insert(
            facet.clone(),
            json!({
                "terms": {
                    "field": facet_field(schema, facet),
                    "size": request.facet_size
                }
            }),
        );
    }

    let mut body = json!({
        "size": request.top,
        "track_total_hits": true,
        "query": query
    });
    if !aggs.is_empty() {
        body["aggs"] = Value::Object(aggs);
    }
    body
}

/// Build a suggest body.
///
/// Uses a `bool_prefix` match over the `search_as_you_type` sub-fields of each
/// suggest-eligible field so partial words match.
pub fn build_suggest_query(request: &SuggestRequest) -> Value {
    let fields: Vec<String> = request
        .fields
        .iter()
        .flat_map(|field| {
            [
                field.clone(),
                format!("{}._2gram", field),
                format!("{}._3gram", field),
            ]
        })
        .collect();

    let mut multi_match = Map::new();
    multi_match.insert("query".to_string(), json!(request.prefix.trim()));
    multi_match.insert("type".to_string(), json!("bool_prefix"));
    multi_match.insert("fields".to_string(), json!(fields));
    if request.fuzzy {
        // AUTO: 0 edits up to 2 chars, 1 edit up to 5, then 2 edits
        multi_match.insert("fuzziness".to_string(), json!("AUTO"));
    }

    json!({
        "size": request.top,
        "query": { "multi_match": multi_match }
    })
}

/// Parse the per-item results of a bulk response.
///
/// Items come back in submission order. A `delete` of a missing document
/// (status 404) counts as success.
pub fn parse_bulk_response(
    actions: &[IndexAction],
    body: &Value,
) -> Result<BulkResponse, SearchIndexError> {
    let items = body
        .get("items")
        .and_then(|items| items.as_array())
        .ok_or_else(|| SearchIndexError::parse("Bulk response has no items"))?;

    if items.len() != actions.len() {
        return Err(SearchIndexError::parse(format!(
            "Bulk response has {} items for {} actions",
            items.len(),
            actions.len()
        )));
    }

    let results = actions
        .iter()
        .zip(items)
        .map(|(action, item)| parse_bulk_item(action, item))
        .collect();

    Ok(BulkResponse::new(results))
}

fn parse_bulk_item(action: &IndexAction, item: &Value) -> BulkItemResult {
    let outcome = item
        .get(bulk_operation(action.kind))
        .or_else(|| item.as_object().and_then(|o| o.values().next()));

    let Some(outcome) = outcome else {
        return BulkItemResult::failed(action.key(), action.kind, 0, "Missing bulk item outcome");
    };

    let status = outcome
        .get("status")
        .and_then(|s| s.as_u64())
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(0);

    if action.kind == IndexActionKind::Delete && status == 404 {
        return BulkItemResult::ok(action.key(), action.kind, status);
    }

    match outcome.get("error") {
        Some(error) => {
            let reason = error
                .get("reason")
                .and_then(|r| r.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            let kind = error.get("type").and_then(|t| t.as_str()).unwrap_or("error");
            BulkItemResult::failed(action.key(), action.kind, status, format!("{}: {}", kind, reason))
        }
        None if (200..300).contains(&status) => BulkItemResult::ok(action.key(), action.kind, status),
        None => BulkItemResult::failed(
            action.key(),
            action.kind,
            status,
            format!("Unexpected status {}", status),
        ),
    }
}

/// Parse hits, total count and facet buckets from a search response.
pub fn parse_search_response(body: &Value) -> Result<SearchResult, SearchIndexError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| SearchIndexError::parse("Search response has no hits"))?;

    // `total` is an object on 7.x+ engines and a bare number on older ones.
    let total = hits
        .get("total")
        .and_then(|t| t.get("value").or(Some(t)))
        .and_then(|t| t.as_u64())
        .unwrap_or(0);

    let hits = hits
        .get("hits")
        .and_then(|h| h.as_array())
        .map(|hits| hits.iter().filter_map(parse_hit).collect())
        .unwrap_or_default();

    let mut facets = BTreeMap::new();
    if let Some(aggregations) = body.get("aggregations").and_then(|a| a.as_object()) {
        for (name, aggregation) in aggregations {
            let buckets = aggregation
                .get("buckets")
                .and_then(|b| b.as_array())
                .map(|buckets| buckets.iter().filter_map(parse_bucket).collect())
                .unwrap_or_default();
            facets.insert(name.clone(), buckets);
        }
    }

    Ok(SearchResult {
        total,
        hits,
        facets,
    })
}

/// Parse suggestions from a suggest response.
///
/// The suggestion text is the first requested field whose value starts with
/// the prefix, falling back to the first requested field with a text value.
pub fn parse_suggest_response(
    request: &SuggestRequest,
    body: &Value,
) -> Result<SuggestResult, SearchIndexError> {
    let hits = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .ok_or_else(|| SearchIndexError::parse("Suggest response has no hits"))?;

    let prefix = request.prefix.trim().to_lowercase();
    let suggestions = hits
        .iter()
        .filter_map(parse_hit)
        .filter_map(|hit| {
            let values: Vec<&str> = request
                .fields
                .iter()
                .filter_map(|field| hit.document.get(field).and_then(|v| v.as_str()))
                .collect();
            let text = values
                .iter()
                .find(|value| value.to_lowercase().starts_with(&prefix))
                .or_else(|| values.first())?
                .to_string();
            Some(Suggestion {
                text,
                key: hit.key,
                document: hit.document,
            })
        })
        .collect();

    Ok(SuggestResult { suggestions })
}

/// Parse the document count from a `_count` response.
pub fn parse_count_response(body: &Value) -> Result<u64, SearchIndexError> {
    body.get("count")
        .and_then(|c| c.as_u64())
        .ok_or_else(|| SearchIndexError::parse("Count response has no count"))
}

fn parse_hit(hit: &Value) -> Option<SearchHit> {
    let key = hit.get("_id")?.as_str()?.to_string();
    let score = hit.get("_score").and_then(|s| s.as_f64()).unwrap_or(0.0);
    let document = hit.get("_source")?.as_object()?.clone();
    Some(SearchHit {
        key,
        score,
        document,
    })
}

fn parse_bucket(bucket: &Value) -> Option<FacetCount> {
    let value = match bucket.get("key_as_string").and_then(|k| k.as_str()) {
        Some(value) => value.to_string(),
        None => match bucket.get("key")? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };
    let count = bucket.get("doc_count")?.as_u64()?;
    Some(FacetCount { value, count })
}
