//! Decoded blockchain records.
//!
//! These mirror what the upstream producer hands to the indexers. They are
//! immutable once produced; the pipeline only reads them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::FieldValue;

/// The kind of source record an indexer is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    EventLog,
    Block,
    Transaction,
    Contract,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::EventLog => "event_log",
            SourceType::Block => "block",
            SourceType::Transaction => "transaction",
            SourceType::Contract => "contract",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A block header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub miner: String,
    pub timestamp: DateTime<Utc>,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub size: u64,
    pub transaction_count: u64,
    #[serde(default)]
    pub nonce: Option<String>,
    /// Difficulty as a decimal string; it overflows 64 bits on some chains.
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub total_difficulty: Option<String>,
    #[serde(default)]
    pub base_fee_per_gas: Option<String>,
    #[serde(default)]
    pub extra_data: Option<String>,
}

/// A transaction together with the receipt fields the store keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_index: u64,
    pub from: String,
    /// `None` for contract creation.
    #[serde(default)]
    pub to: Option<String>,
    /// Value in wei as a decimal string.
    pub value: String,
    pub gas: u64,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub gas_used: Option<u64>,
    pub nonce: u64,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Address of the contract created by this transaction, if any.
    #[serde(default)]
    pub receipt_contract_address: Option<String>,
}

/// A deployed contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub address: String,
    pub creator: String,
    pub transaction_hash: String,
    pub block_number: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abi: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Where a log was emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Address of the emitting contract.
    pub address: String,
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub transaction_index: u64,
    pub log_index: u64,
    #[serde(default)]
    pub removed: bool,
}

/// A decoded event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    /// Decoded event name, e.g. `Transfer`.
    pub event_name: String,
    pub log: LogMetadata,
    /// Decoded event parameters by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, FieldValue>,
}

impl EventLog {
    pub fn new(event_name: impl Into<String>, log: LogMetadata) -> Self {
        Self {
            event_name: event_name.into(),
            log,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Any record the upstream producer can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRecord {
    EventLog(EventLog),
    Block(Block),
    Transaction(Transaction),
    Contract(Contract),
}

impl SourceRecord {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceRecord::EventLog(_) => SourceType::EventLog,
            SourceRecord::Block(_) => SourceType::Block,
            SourceRecord::Transaction(_) => SourceType::Transaction,
            SourceRecord::Contract(_) => SourceType::Contract,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_event_log() {
        let line = r#"{
            "type": "event_log",
            "event_name": "Transfer",
            "log": {
                "address": "0xA0b8",
                "block_number": 100,
                "block_hash": "0xbb",
                "transaction_hash": "0xTT",
                "transaction_index": 2,
                "log_index": 7
            },
            "parameters": { "from": "0x01", "to": "0x02", "value": "1000000" }
        }"#;

        let record: SourceRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.source_type(), SourceType::EventLog);

        let SourceRecord::EventLog(event) = record else {
            panic!("expected an event log");
        };
        assert_eq!(event.event_name, "Transfer");
        assert_eq!(event.log.log_index, 7);
        assert!(!event.log.removed);
        assert_eq!(
            event.parameters.get("value"),
            Some(&FieldValue::Text("1000000".to_string()))
        );
    }

    #[test]
    fn test_parse_contract_with_optional_fields_missing() {
        let line = r#"{
            "type": "contract",
            "address": "0xC0",
            "creator": "0xDE",
            "transaction_hash": "0xTT",
            "block_number": 5
        }"#;

        let record: SourceRecord = serde_json::from_str(line).unwrap();
        let SourceRecord::Contract(contract) = record else {
            panic!("expected a contract");
        };
        assert!(contract.name.is_none());
        assert!(contract.abi.is_none());
    }

    #[test]
    fn test_source_type_names() {
        assert_eq!(SourceType::EventLog.as_str(), "event_log");
        assert_eq!(SourceType::Transaction.to_string(), "transaction");
    }
}
