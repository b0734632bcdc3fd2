//! Starknet JSON-RPC request and response types used by the feed.

pub mod client;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    Latest,
    Pending,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum BlockId {
    Number { block_number: u64 },
    Tag(BlockTag),
}

impl BlockId {
    pub fn number(block_number: u64) -> Self {
        BlockId::Number { block_number }
    }
}

/// Argument of `starknet_getEvents`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventFilter {
    pub from_block: BlockId,
    pub to_block: BlockId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Vec<String>>>,
    pub chunk_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Event as it appears inside a transaction receipt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub from_address: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
}

impl Event {
    pub fn emitted(self, transaction_hash: &str, block_number: Option<u64>) -> EmittedEvent {
        EmittedEvent {
            from_address: self.from_address,
            keys: self.keys,
            data: self.data,
            block_hash: None,
            block_number,
            transaction_hash: transaction_hash.to_owned(),
        }
    }
}

/// Event returned by `starknet_getEvents`. Pending events carry no block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EmittedEvent {
    pub from_address: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    pub transaction_hash: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EventsChunk {
    pub events: Vec<EmittedEvent>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

/// The subset of `starknet_getBlockWithTxHashes` the feed needs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    pub timestamp: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[test]
fn test_event_filter_serialization() {
    let filter = EventFilter {
        from_block: BlockId::number(10),
        to_block: BlockId::Tag(BlockTag::Latest),
        address: Some("0x123".to_owned()),
        keys: None,
        chunk_size: 100,
        continuation_token: None,
    };
    assert_eq!(
        serde_json::to_value(&filter).unwrap(),
        serde_json::json!({
            "from_block": {"block_number": 10},
            "to_block": "latest",
            "address": "0x123",
            "chunk_size": 100
        })
    );
}

#[test]
fn test_receipt_deserialization() {
    let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
        "type": "INVOKE",
        "transaction_hash": "0xabc",
        "block_number": 7,
        "execution_status": "SUCCEEDED",
        "events": [{"from_address": "0x1", "keys": ["0x2"], "data": []}]
    }))
    .unwrap();
    let event = receipt.events[0].clone().emitted(&receipt.transaction_hash, receipt.block_number);
    assert_eq!(event.transaction_hash, "0xabc");
    assert_eq!(event.block_number, Some(7));
    assert_eq!(event.keys, vec!["0x2".to_owned()]);
}
