//! Shared test helpers for `richwallet-core` unit tests.
//!
//! Deterministic hashes, addresses and transfer records, plus a token ABI
//! covering both ERC20-style and ERC777-style transfers.

use crate::types::{Address, TokenTransferEvent, H256};

/// A hash whose bytes are all `b`.
pub fn hash(b: u8) -> H256 {
    H256::repeat_byte(b)
}

/// An address whose bytes are all `b`.
pub fn address_from_byte(b: u8) -> Address {
    Address::repeat_byte(b)
}

/// Full `0x`-prefixed hex, as it appears on the wire and in messages.
pub fn hex_of(value: impl std::fmt::Debug) -> String {
    format!("{value:?}")
}

/// An unenriched transfer record for transaction `hash(b)`.
pub fn event(b: u8) -> TokenTransferEvent {
    TokenTransferEvent {
        transaction_hash: hash(b),
        from: address_from_byte(0x10),
        to: Some(address_from_byte(0x20)),
        value: "1000".into(),
        token_identifier: None,
        timestamp: None,
        block_hash: None,
        revert_rate: None,
    }
}

/// A token ABI exposing `transfer(address,uint256)` and
/// `send(address,uint256,bytes)`.
pub fn token_abi() -> String {
    serde_json::json!([
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                {"name": "to", "type": "address"},
                {"name": "value", "type": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "send",
            "inputs": [
                {"name": "recipient", "type": "address"},
                {"name": "amount", "type": "uint256"},
                {"name": "data", "type": "bytes"}
            ],
            "outputs": [],
            "stateMutability": "nonpayable"
        },
        {
            "type": "event",
            "name": "Transfer",
            "anonymous": false,
            "inputs": [
                {"name": "from", "type": "address", "indexed": true},
                {"name": "to", "type": "address", "indexed": true},
                {"name": "value", "type": "uint256", "indexed": false}
            ]
        }
    ])
    .to_string()
}
