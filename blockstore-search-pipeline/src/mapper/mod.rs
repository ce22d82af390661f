//! Document mapper.
//!
//! Turns a typed source record into a flat [`Document`] shaped by an
//! [`IndexSchemaDescriptor`]. Mapping is pure and deterministic: the same
//! record always yields the same key and the same fields, which is what makes
//! merge-or-upload idempotent across restarts and re-indexing runs.

use std::collections::BTreeMap;

use blockstore_search_shared::{
    Block, Contract, Document, EventLog, FieldValue, IndexSchemaDescriptor, SourceRecord,
    Transaction,
};

use crate::errors::MappingError;

/// A record that can be enumerated into document fields.
pub trait SearchableRecord: Send + Sync {
    /// Stable key identifying the record within its document type.
    fn document_key(&self) -> String;

    /// Every field the record can provide. Absent values are `None`.
    fn field_values(&self) -> Vec<(String, Option<FieldValue>)>;
}

/// Map a record into a document.
///
/// Only fields declared on the descriptor are kept, and absent fields are
/// omitted rather than written as null.
///
/// # Errors
///
/// * [`MappingError::EmptyKey`] - The record produced an empty key
/// * [`MappingError::MissingRequiredField`] - A required field is absent
pub fn map_record<R: SearchableRecord + ?Sized>(
    record: &R,
    schema: &IndexSchemaDescriptor,
) -> Result<Document, MappingError> {
    let key = record.document_key();
    if key.trim().is_empty() {
        return Err(MappingError::EmptyKey(schema.name().to_string()));
    }

    let fields: BTreeMap<String, FieldValue> = record
        .field_values()
        .into_iter()
        .filter(|(name, _)| name != schema.key_field() && schema.has_field(name))
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect();

    for required in schema.required_fields() {
        if required != schema.key_field() && !fields.contains_key(required) {
            return Err(MappingError::MissingRequiredField {
                index: schema.name().to_string(),
                field: required.to_string(),
            });
        }
    }

    Ok(Document::new(schema.key_field(), key, fields))
}

fn field(name: &str, value: impl Into<FieldValue>) -> (String, Option<FieldValue>) {
    (name.to_string(), Some(value.into()))
}

fn optional<T: Into<FieldValue>>(name: &str, value: Option<T>) -> (String, Option<FieldValue>) {
    (name.to_string(), value.map(Into::into))
}

/// Hashes and addresses are compared lower-case; producers disagree on checksum casing.
fn normalized(hex: &str) -> String {
    hex.trim().to_lowercase()
}

impl SearchableRecord for Block {
    fn document_key(&self) -> String {
        self.number.to_string()
    }

    fn field_values(&self) -> Vec<(String, Option<FieldValue>)> {
        vec![
            field("number", self.number),
            field("hash", normalized(&self.hash)),
            field("parent_hash", normalized(&self.parent_hash)),
            field("miner", normalized(&self.miner)),
            field("timestamp", self.timestamp),
            field("gas_limit", self.gas_limit),
            field("gas_used", self.gas_used),
            field("size", self.size),
            field("transaction_count", self.transaction_count),
            optional("nonce", self.nonce.clone()),
            optional("difficulty", self.difficulty.clone()),
            optional("total_difficulty", self.total_difficulty.clone()),
            optional("base_fee_per_gas", self.base_fee_per_gas.clone()),
            optional("extra_data", self.extra_data.clone()),
        ]
    }
}

impl SearchableRecord for Transaction {
    fn document_key(&self) -> String {
        normalized(&self.hash)
    }

    fn field_values(&self) -> Vec<(String, Option<FieldValue>)> {
        vec![
            field("hash", normalized(&self.hash)),
            field("block_number", self.block_number),
            field("block_hash", normalized(&self.block_hash)),
            field("transaction_index", self.transaction_index),
            field("from", normalized(&self.from)),
            optional("to", self.to.as_deref().map(normalized)),
            field("value", self.value.clone()),
            field("gas", self.gas),
            optional("gas_price", self.gas_price.clone()),
            optional("gas_used", self.gas_used),
            field("nonce", self.nonce),
            optional("input", self.input.clone()),
            optional("timestamp", self.timestamp),
            field("failed", self.failed),
            optional("error", self.error.clone()),
            optional(
                "receipt_contract_address",
                self.receipt_contract_address.as_deref().map(normalized),
            ),
        ]
    }
}

impl SearchableRecord for Contract {
    fn document_key(&self) -> String {
        normalized(&self.address)
    }

    fn field_values(&self) -> Vec<(String, Option<FieldValue>)> {
        vec![
            field("address", normalized(&self.address)),
            field("creator", normalized(&self.creator)),
            field("transaction_hash", normalized(&self.transaction_hash)),
            field("block_number", self.block_number),
            optional("name", self.name.clone()),
            optional("abi", self.abi.clone()),
            optional("code", self.code.clone()),
        ]
    }
}

impl SearchableRecord for EventLog {
    /// `{transaction_hash}_{log_index}`: a log is unique within its transaction.
    fn document_key(&self) -> String {
        if self.log.transaction_hash.trim().is_empty() {
            return String::new();
        }
        format!("{}_{}", normalized(&self.log.transaction_hash), self.log.log_index)
    }

    fn field_values(&self) -> Vec<(String, Option<FieldValue>)> {
        // Log metadata is listed last so it wins over a parameter of the same name.
        let mut values: Vec<(String, Option<FieldValue>)> = self
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), Some(value.clone())))
            .collect();

        values.extend([
            field("event_name", self.event_name.clone()),
            field("log_address", normalized(&self.log.address)),
            field("block_number", self.log.block_number),
            field("block_hash", normalized(&self.log.block_hash)),
            field("transaction_hash", normalized(&self.log.transaction_hash)),
            field("transaction_index", self.log.transaction_index),
            field("log_index", self.log.log_index),
            field("removed", self.log.removed),
        ]);
        values
    }
}

impl SearchableRecord for SourceRecord {
    fn document_key(&self) -> String {
        match self {
            SourceRecord::EventLog(event) => event.document_key(),
            SourceRecord::Block(block) => block.document_key(),
            SourceRecord::Transaction(tx) => tx.document_key(),
            SourceRecord::Contract(contract) => contract.document_key(),
        }
    }

    fn field_values(&self) -> Vec<(String, Option<FieldValue>)> {
        match self {
            SourceRecord::EventLog(event) => event.field_values(),
            SourceRecord::Block(block) => block.field_values(),
            SourceRecord::Transaction(tx) => tx.field_values(),
            SourceRecord::Contract(contract) => contract.field_values(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use blockstore_search_shared::{Block, Contract, EventLog, LogMetadata, Transaction};
    use chrono::{TimeZone, Utc};

    pub fn block(number: u64) -> Block {
        Block {
            number,
            hash: format!("0xB10C{:04x}", number),
            parent_hash: format!("0xB10C{:04x}", number.saturating_sub(1)),
            miner: "0xEA674fdDe714fd979de3EdF0F56AA9716B898ec8".to_string(),
            timestamp: Utc.with_ymd_and_hms(2019, 7, 12, 14, 29, 1).unwrap(),
            gas_limit: 8_000_000,
            gas_used: 7_991_068,
            size: 30_712,
            transaction_count: 142,
            nonce: Some("0x2f5a30a009b9b4c5".to_string()),
            difficulty: Some("2159925436431270".to_string()),
            total_difficulty: None,
            base_fee_per_gas: None,
            extra_data: None,
        }
    }

    pub fn transaction(hash: &str) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            block_number: 8_000_000,
            block_hash: "0xB10C".to_string(),
            transaction_index: 3,
            from: "0xAbC".to_string(),
            to: None,
            value: "1000000000000000000".to_string(),
            gas: 21_000,
            gas_price: Some("20000000000".to_string()),
            gas_used: Some(21_000),
            nonce: 9,
            input: None,
            timestamp: None,
            failed: false,
            error: None,
            receipt_contract_address: Some("0xC0FFEE".to_string()),
        }
    }

    pub fn contract(address: &str, name: Option<&str>) -> Contract {
        Contract {
            address: address.to_string(),
            creator: "0xDEAD".to_string(),
            transaction_hash: "0xF00D".to_string(),
            block_number: 8_000_001,
            name: name.map(str::to_string),
            abi: None,
            code: Some("0x6080".to_string()),
        }
    }

    pub fn transfer(tx_hash: &str, log_index: u64) -> EventLog {
        EventLog::new(
            "Transfer",
            LogMetadata {
                address: "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(),
                block_number: 8_000_002,
                block_hash: "0xBB".to_string(),
                transaction_hash: tx_hash.to_string(),
                transaction_index: 7,
                log_index,
                removed: false,
            },
        )
        .with_parameter("from", "0x01")
        .with_parameter("to", "0x02")
        .with_parameter("value", "2500000")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use blockstore_search_shared::schema::presets;
    use blockstore_search_shared::{FieldDescriptor, LogMetadata};

    #[test]
    fn test_mapping_is_deterministic() {
        let schema = presets::blocks();
        let record = block(8_000_000);

        let first = map_record(&record, &schema).unwrap();
        let second = map_record(&record, &schema).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.key(), "8000000");
    }

    #[test]
    fn test_block_fields() {
        let doc = map_record(&block(42), &presets::blocks()).unwrap();

        assert_eq!(doc.get("id"), Some(&FieldValue::from("42")));
        assert_eq!(doc.get("number"), Some(&FieldValue::Unsigned(42)));
        assert_eq!(
            doc.get("miner"),
            Some(&FieldValue::from("0xea674fdde714fd979de3edf0f56aa9716b898ec8"))
        );
        assert_eq!(
            doc.get("timestamp"),
            Some(&FieldValue::from("2019-07-12T14:29:01Z"))
        );
        // Absent optional fields are omitted, not null
        assert!(doc.get("total_difficulty").is_none());
        assert!(doc.get("extra_data").is_none());
    }

    #[test]
    fn test_transaction_key_is_lowercased() {
        let doc = map_record(&transaction("0xABCDEF"), &presets::transactions()).unwrap();

        assert_eq!(doc.key(), "0xabcdef");
        assert_eq!(doc.get("from"), Some(&FieldValue::from("0xabc")));
        assert!(doc.get("to").is_none());
        assert_eq!(doc.get("failed"), Some(&FieldValue::Bool(false)));
        assert_eq!(
            doc.get("receipt_contract_address"),
            Some(&FieldValue::from("0xc0ffee"))
        );
    }

    #[test]
    fn test_fields_outside_descriptor_are_dropped() {
        let doc = map_record(&contract("0xC0", Some("Tether USD")), &presets::contracts()).unwrap();

        // `code` is provided by the record but not declared
        assert!(doc.get("code").is_none());
        assert_eq!(doc.get("name"), Some(&FieldValue::from("Tether USD")));
    }

    #[test]
    fn test_missing_required_field() {
        let schema = IndexSchemaDescriptor::new(
            "named-contracts",
            "id",
            vec![
                FieldDescriptor::keyword("id").required(),
                FieldDescriptor::text("name").required(),
            ],
        );

        let err = map_record(&contract("0xC0", None), &schema).unwrap_err();

        assert_eq!(
            err,
            MappingError::MissingRequiredField {
                index: "named-contracts".to_string(),
                field: "name".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_key() {
        let err = map_record(&contract("  ", None), &presets::contracts()).unwrap_err();
        assert_eq!(err, MappingError::EmptyKey("contracts".to_string()));
    }

    #[test]
    fn test_event_log_key_and_fields() {
        let doc = map_record(&transfer("0xAAA", 5), &presets::erc20_transfer()).unwrap();

        assert_eq!(doc.key(), "0xaaa_5");
        assert_eq!(doc.get("event_name"), Some(&FieldValue::from("Transfer")));
        assert_eq!(doc.get("log_index"), Some(&FieldValue::Unsigned(5)));
        assert_eq!(doc.get("value"), Some(&FieldValue::from("2500000")));
        assert_eq!(
            doc.get("log_address"),
            Some(&FieldValue::from("0xdac17f958d2ee523a2206206994597c13d831ec7"))
        );
    }

    #[test]
    fn test_event_log_metadata_wins_over_parameter() {
        let event = EventLog::new(
            "Odd",
            LogMetadata {
                address: "0x01".to_string(),
                block_number: 10,
                block_hash: "0xbb".to_string(),
                transaction_hash: "0xtt".to_string(),
                transaction_index: 0,
                log_index: 0,
                removed: false,
            },
        )
        .with_parameter("block_number", "not a number");

        let doc = map_record(&event, &presets::event_log("odd", vec![])).unwrap();

        assert_eq!(doc.get("block_number"), Some(&FieldValue::Unsigned(10)));
    }

    #[test]
    fn test_source_record_dispatch() {
        let record = SourceRecord::Transaction(transaction("0xAB"));
        assert_eq!(record.document_key(), "0xab");
        assert_eq!(
            map_record(&record, &presets::transactions()).unwrap(),
            map_record(&transaction("0xAB"), &presets::transactions()).unwrap()
        );
    }
}
