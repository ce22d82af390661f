//! OpenSearch index configuration and mappings.
//!
//! Index mappings are derived from an [`IndexSchemaDescriptor`] rather than
//! written by hand, so every document type gets a mapping consistent with the
//! fields the mapper emits.

use serde_json::{json, Map, Value};

use blockstore_search_shared::{FieldDescriptor, FieldType, IndexSchemaDescriptor};

/// Name of the keyword sub-field added to text fields used for facets or sorting.
pub const RAW_SUBFIELD: &str = "raw";

/// Normalizer applied to searchable keyword fields so hashes and addresses
/// match regardless of the checksum casing in the query.
pub const LOWERCASE_NORMALIZER: &str = "lowercase_keyword";

/// Shard layout for newly created indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }
}

impl IndexConfig {
    pub fn new(number_of_shards: u32, number_of_replicas: u32) -> Self {
        Self {
            number_of_shards,
            number_of_replicas,
        }
    }
}

/// Build the create-index body (settings and mappings) for a document type.
///
/// Field types map as follows:
/// - **Keyword** -> `keyword`, lower-cased through [`LOWERCASE_NORMALIZER`]
///   when searchable
/// - **Text** -> `text`, or `search_as_you_type` when suggest-eligible, with a
///   `raw` keyword sub-field when facetable or sortable
/// - **Integer** / **Float** -> `long` / `double`
/// - **Boolean** / **Date** / **Object** -> `boolean` / `date` / `object`
pub fn build_index_body(schema: &IndexSchemaDescriptor, config: &IndexConfig) -> Value {
    let properties: Map<String, Value> = schema
        .fields()
        .iter()
        .map(|field| (field.name.clone(), field_mapping(field)))
        .collect();

    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas,
            "analysis": {
                "normalizer": {
                    LOWERCASE_NORMALIZER: {
                        "type": "custom",
                        "filter": ["lowercase"]
                    }
                }
            }
        },
        "mappings": {
            "properties": properties
        }
    })
}

fn field_mapping(field: &FieldDescriptor) -> Value {
    match field.field_type {
        FieldType::Keyword if field.searchable => {
            json!({ "type": "keyword", "normalizer": LOWERCASE_NORMALIZER })
        }
        FieldType::Keyword => json!({ "type": "keyword" }),
        FieldType::Text => {
            let mut mapping = Map::new();
            let field_type = if field.suggestible {
                "search_as_you_type"
            } else {
                "text"
            };
            mapping.insert("type".to_string(), json!(field_type));
            if field.facetable || field.sortable {
                let mut sub_fields = Map::new();
                sub_fields.insert(
                    RAW_SUBFIELD.to_string(),
                    json!({ "type": "keyword", "ignore_above": 256 }),
                );
                mapping.insert("fields".to_string(), Value::Object(sub_fields));
            }
            Value::Object(mapping)
        }
        FieldType::Integer => json!({ "type": "long" }),
        FieldType::Float => json!({ "type": "double" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Date => json!({ "type": "date" }),
        FieldType::Object => json!({ "type": "object" }),
    }
}

/// Field to aggregate on when faceting by `field`.
///
/// Text fields are analyzed, so facets use their keyword sub-field.
pub fn facet_field(schema: &IndexSchemaDescriptor, field: &str) -> String {
    match schema.field(field) {
        Some(descriptor) if descriptor.field_type == FieldType::Text => {
            format!("{}.{}", field, RAW_SUBFIELD)
        }
        _ => field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_search_shared::schema::presets;

    #[test]
    fn test_index_settings_structure() {
        let body = build_index_body(&presets::contracts(), &IndexConfig::default());

        assert!(body["settings"]["number_of_shards"].is_number());
        assert!(body["settings"]["number_of_replicas"].is_number());

        let properties = &body["mappings"]["properties"];
        assert_eq!(properties["id"]["type"], "keyword");
        assert!(properties["id"].get("normalizer").is_none());
        assert_eq!(properties["block_number"]["type"], "long");
        assert_eq!(properties["abi"]["type"], "text");
        assert!(properties["abi"].get("fields").is_none());

        // Suggest-eligible and facetable
        assert_eq!(properties["name"]["type"], "search_as_you_type");
        assert_eq!(properties["name"]["fields"]["raw"]["type"], "keyword");
    }

    #[test]
    fn test_every_field_mapped() {
        let schema = presets::transactions();
        let body = build_index_body(&schema, &IndexConfig::new(3, 0));

        let properties = body["mappings"]["properties"].as_object().unwrap();
        assert_eq!(properties.len(), schema.fields().len());
        assert_eq!(properties["failed"]["type"], "boolean");
        assert_eq!(properties["timestamp"]["type"], "date");
        assert_eq!(body["settings"]["number_of_shards"], 3);
    }

    #[test]
    fn test_searchable_keywords_are_lowercased() {
        let body = build_index_body(&presets::erc20_transfer(), &IndexConfig::default());

        let normalizer = &body["settings"]["analysis"]["normalizer"][LOWERCASE_NORMALIZER];
        assert_eq!(normalizer["filter"], serde_json::json!(["lowercase"]));

        let properties = &body["mappings"]["properties"];
        assert_eq!(properties["log_address"]["normalizer"], LOWERCASE_NORMALIZER);
        assert_eq!(properties["from"]["normalizer"], LOWERCASE_NORMALIZER);
        // Facet buckets keep the stored casing
        assert!(properties["event_name"].get("normalizer").is_none());
    }

    #[test]
    fn test_facet_field() {
        let schema = presets::contracts();
        assert_eq!(facet_field(&schema, "name"), "name.raw");
        assert_eq!(facet_field(&schema, "creator"), "creator");
    }
}
