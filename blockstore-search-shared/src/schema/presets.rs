//! Descriptors for the document types the indexer ships with.

use super::{FieldDescriptor, IndexSchemaDescriptor, DEFAULT_KEY_FIELD};

pub const BLOCKS_INDEX: &str = "blocks";
pub const TRANSACTIONS_INDEX: &str = "transactions";
pub const CONTRACTS_INDEX: &str = "contracts";
pub const ERC20_TRANSFER_INDEX: &str = "erc20-transfer";
pub const ERC20_APPROVAL_INDEX: &str = "erc20-approval";

/// Block headers, keyed by block number.
pub fn blocks() -> IndexSchemaDescriptor {
    IndexSchemaDescriptor::new(
        BLOCKS_INDEX,
        DEFAULT_KEY_FIELD,
        vec![
            FieldDescriptor::keyword(DEFAULT_KEY_FIELD).required(),
            FieldDescriptor::integer("number").sortable().required(),
            FieldDescriptor::keyword("hash").searchable().required(),
            FieldDescriptor::keyword("parent_hash").searchable(),
            FieldDescriptor::keyword("miner").searchable().facetable(),
            FieldDescriptor::date("timestamp").sortable().required(),
            FieldDescriptor::integer("gas_limit"),
            FieldDescriptor::integer("gas_used").sortable(),
            FieldDescriptor::integer("size"),
            FieldDescriptor::integer("transaction_count").sortable(),
            FieldDescriptor::keyword("nonce"),
            FieldDescriptor::keyword("difficulty"),
            FieldDescriptor::keyword("total_difficulty"),
            FieldDescriptor::keyword("base_fee_per_gas"),
            FieldDescriptor::text("extra_data").searchable(),
        ],
    )
}

/// Transactions with their receipt status, keyed by transaction hash.
pub fn transactions() -> IndexSchemaDescriptor {
    IndexSchemaDescriptor::new(
        TRANSACTIONS_INDEX,
        DEFAULT_KEY_FIELD,
        vec![
            FieldDescriptor::keyword(DEFAULT_KEY_FIELD).required(),
            FieldDescriptor::keyword("hash").searchable().required(),
            FieldDescriptor::integer("block_number").sortable().required(),
            FieldDescriptor::keyword("block_hash"),
            FieldDescriptor::integer("transaction_index"),
            FieldDescriptor::keyword("from").searchable().facetable().required(),
            FieldDescriptor::keyword("to").searchable().facetable(),
            FieldDescriptor::keyword("value").required(),
            FieldDescriptor::integer("gas"),
            FieldDescriptor::keyword("gas_price"),
            FieldDescriptor::integer("gas_used").sortable(),
            FieldDescriptor::integer("nonce"),
            FieldDescriptor::keyword("input"),
            FieldDescriptor::date("timestamp").sortable(),
            FieldDescriptor::boolean("failed").facetable(),
            FieldDescriptor::text("error").searchable(),
            FieldDescriptor::keyword("receipt_contract_address").searchable(),
        ],
    )
}

/// Deployed contracts, keyed by address.
pub fn contracts() -> IndexSchemaDescriptor {
    IndexSchemaDescriptor::new(
        CONTRACTS_INDEX,
        DEFAULT_KEY_FIELD,
        vec![
            FieldDescriptor::keyword(DEFAULT_KEY_FIELD).required(),
            FieldDescriptor::keyword("address").searchable().required(),
            FieldDescriptor::keyword("creator").searchable().facetable().required(),
            FieldDescriptor::keyword("transaction_hash").searchable(),
            FieldDescriptor::integer("block_number").sortable(),
            FieldDescriptor::text("name")
                .searchable()
                .facetable()
                .sortable()
                .suggestible(),
            FieldDescriptor::text("abi"),
        ],
    )
}

/// A decoded event type, keyed by `{transaction_hash}_{log_index}`.
///
/// The log metadata fields shared by every event come first, followed by
/// `parameters` describing the decoded event arguments.
pub fn event_log(
    index_name: impl Into<String>,
    parameters: Vec<FieldDescriptor>,
) -> IndexSchemaDescriptor {
    let mut fields = vec![
        FieldDescriptor::keyword(DEFAULT_KEY_FIELD).required(),
        FieldDescriptor::keyword("event_name").facetable().required(),
        FieldDescriptor::keyword("log_address").searchable().facetable().required(),
        FieldDescriptor::integer("block_number").sortable().required(),
        FieldDescriptor::keyword("block_hash"),
        FieldDescriptor::keyword("transaction_hash").searchable().required(),
        FieldDescriptor::integer("transaction_index"),
        FieldDescriptor::integer("log_index").required(),
        FieldDescriptor::boolean("removed").facetable(),
    ];
    fields.extend(parameters);

    IndexSchemaDescriptor::new(index_name, DEFAULT_KEY_FIELD, fields)
}

/// ERC-20 `Transfer(from, to, value)`.
pub fn erc20_transfer() -> IndexSchemaDescriptor {
    event_log(
        ERC20_TRANSFER_INDEX,
        vec![
            FieldDescriptor::keyword("from").searchable().facetable(),
            FieldDescriptor::keyword("to").searchable().facetable(),
            FieldDescriptor::keyword("value"),
        ],
    )
}

/// ERC-20 `Approval(owner, spender, value)`.
pub fn erc20_approval() -> IndexSchemaDescriptor {
    event_log(
        ERC20_APPROVAL_INDEX,
        vec![
            FieldDescriptor::keyword("owner").searchable().facetable(),
            FieldDescriptor::keyword("spender").searchable().facetable(),
            FieldDescriptor::keyword("value"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for schema in [
            blocks(),
            transactions(),
            contracts(),
            erc20_transfer(),
            erc20_approval(),
        ] {
            assert_eq!(schema.validate(), Ok(()), "{} is invalid", schema.name());
        }
    }

    #[test]
    fn test_event_log_appends_parameters() {
        let schema = erc20_transfer();
        assert_eq!(schema.name(), ERC20_TRANSFER_INDEX);
        assert!(schema.has_field("log_index"));
        assert_eq!(
            schema.facetable_fields(),
            vec!["event_name", "log_address", "removed", "from", "to"]
        );
    }

    #[test]
    fn test_event_log_rejects_parameter_shadowing_metadata() {
        let schema = event_log("custom", vec![FieldDescriptor::keyword("block_number")]);
        assert!(schema.validate().is_err());
    }
}
