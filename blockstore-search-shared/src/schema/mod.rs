//! Index schema descriptors.
//!
//! An [`IndexSchemaDescriptor`] is the static description of one document
//! type: the index it lives in, its key field and which fields take part in
//! full-text search, facets, sorting and suggestions. The mapper uses it to
//! decide which fields end up in a document; the query facade uses it for
//! default facets and suggest fields; the index provider uses it to build the
//! index mapping.

pub mod presets;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key field used by every preset descriptor.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// Storage type of a document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Exact-match string: hashes, addresses, names used as filters.
    Keyword,
    /// Analyzed free text.
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Object,
}

/// One field of a document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub facetable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub suggestible: bool,
    #[serde(default)]
    pub required: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            searchable: false,
            facetable: false,
            sortable: false,
            suggestible: false,
            required: false,
        }
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Keyword)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Object)
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn facetable(mut self) -> Self {
        self.facetable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn suggestible(mut self) -> Self {
        self.suggestible = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Errors raised by [`IndexSchemaDescriptor::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Index name must not be empty")]
    EmptyIndexName,

    #[error("Key field '{0}' is not declared")]
    MissingKeyField(String),

    #[error("Key field '{0}' must be a keyword field")]
    InvalidKeyField(String),

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Field '{field}' cannot be {flag}: {reason}")]
    InvalidFlag {
        field: String,
        flag: &'static str,
        reason: &'static str,
    },
}

/// Static description of one document type and the index that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchemaDescriptor {
    name: String,
    key_field: String,
    fields: Vec<FieldDescriptor>,
}

impl IndexSchemaDescriptor {
    pub fn new(
        name: impl Into<String>,
        key_field: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            fields,
        }
    }

    /// Same descriptor stored in an index named `{prefix}{name}`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.name = format!("{}{}", prefix, self.name);
        self
    }

    /// Name of the target index.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn searchable_fields(&self) -> Vec<&str> {
        self.names_where(|f| f.searchable)
    }

    pub fn facetable_fields(&self) -> Vec<&str> {
        self.names_where(|f| f.facetable)
    }

    pub fn sortable_fields(&self) -> Vec<&str> {
        self.names_where(|f| f.sortable)
    }

    pub fn suggestible_fields(&self) -> Vec<&str> {
        self.names_where(|f| f.suggestible)
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.names_where(|f| f.required)
    }

    fn names_where(&self, predicate: impl Fn(&FieldDescriptor) -> bool) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| predicate(f))
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Check the descriptor is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an empty index name, an undeclared or
    /// non-keyword key field, a duplicated field, facet/sort flags on an
    /// object field, or a suggest flag on a field that is not text.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyIndexName);
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }

            if field.field_type == FieldType::Object {
                if field.facetable {
                    return Err(invalid_flag(field, "facetable", "object fields have no single value"));
                }
                if field.sortable {
                    return Err(invalid_flag(field, "sortable", "object fields have no single value"));
                }
            }

            if field.suggestible && field.field_type != FieldType::Text {
                return Err(invalid_flag(field, "suggestible", "only text fields take suggestions"));
            }
        }

        match self.field(&self.key_field) {
            None => Err(SchemaError::MissingKeyField(self.key_field.clone())),
            Some(key) if key.field_type != FieldType::Keyword => {
                Err(SchemaError::InvalidKeyField(self.key_field.clone()))
            }
            Some(_) => Ok(()),
        }
    }
}

fn invalid_flag(field: &FieldDescriptor, flag: &'static str, reason: &'static str) -> SchemaError {
    SchemaError::InvalidFlag {
        field: field.name.clone(),
        flag,
        reason,
    }
}
