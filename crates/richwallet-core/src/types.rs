//! Domain types shared by the scan clients, the node port, the enricher and
//! the transaction builder.
//!
//! Addresses, hashes and 256-bit quantities are the `ethers` primitives.
//! Note their `Display` abbreviates (`0x1111…1111`); use `{:?}` for the full
//! hex form. Records returned by the index service are normalized into
//! [`TokenTransferEvent`] regardless of whether they describe a native-coin
//! transaction or a token transfer.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use ethers::types::{Address, Bytes, H256, U256};

use crate::error::CoreError;

// ==============================================================================
// Parsing
// ==============================================================================

fn strip_hex_prefix<'a>(s: &'a str, what: &str) -> Result<&'a str, CoreError> {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| CoreError::InvalidInput(format!("{what} `{s}` must start with 0x")))
}

/// Parse a `0x`-prefixed 20-byte hex address (any case).
pub fn parse_address(s: &str) -> Result<Address, CoreError> {
    let digits = strip_hex_prefix(s, "address")?;
    digits
        .parse()
        .map_err(|e| CoreError::InvalidInput(format!("address `{s}`: {e}")))
}

/// Parse a `0x`-prefixed 32-byte hex hash (any case).
pub fn parse_hash(s: &str) -> Result<H256, CoreError> {
    let digits = strip_hex_prefix(s, "hash")?;
    digits
        .parse()
        .map_err(|e| CoreError::InvalidInput(format!("hash `{s}`: {e}")))
}

/// Parse an amount in the smallest unit: decimal, or hex with `0x`.
pub fn parse_amount(s: &str) -> Result<U256, CoreError> {
    let parsed = match s.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(s).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| CoreError::InvalidInput(format!("amount `{s}`: {e}")))
}

// ==============================================================================
// Transfer Records
// ==============================================================================

/// A single transfer touching an account: either a token transfer event or
/// a native-coin transaction normalized into the same shape.
///
/// `block_hash` and `revert_rate` are filled in by the enricher; they are
/// absent for transactions that have not been mined yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferEvent {
    pub transaction_hash: H256,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: String,
    /// Token contract address; `None` for native-coin transfers.
    #[serde(default, rename = "contractAddress", alias = "address")]
    pub token_identifier: Option<Address>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default)]
    pub revert_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenTransferEventList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub list: Vec<TokenTransferEvent>,
}

/// A native-coin transaction as listed by the index service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: H256,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub status: Option<u64>,
}

impl Transaction {
    pub fn to_token_transfer_event(&self) -> TokenTransferEvent {
        TokenTransferEvent {
            transaction_hash: self.hash.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            value: self.value.clone(),
            token_identifier: None,
            timestamp: self.timestamp,
            block_hash: None,
            revert_rate: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub list: Vec<Transaction>,
}

impl TransactionList {
    pub fn to_token_transfer_event_list(&self) -> TokenTransferEventList {
        TokenTransferEventList {
            total: self.total,
            list: self
                .list
                .iter()
                .map(Transaction::to_token_transfer_event)
                .collect(),
        }
    }
}

// ==============================================================================
// Contract Metadata
// ==============================================================================

/// Token standard a contract implements, as classified by the contract
/// manager's `typeCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    General,
    Erc20,
    Erc777,
    Erc721,
    FansCoin,
    Dex,
    Unknown,
}

impl ContractType {
    /// Map the contract manager's numeric type code onto a contract type.
    pub fn from_type_code(code: i64) -> Self {
        match code {
            0 => Self::General,
            1 => Self::Erc20,
            2 => Self::Erc777,
            3 => Self::Erc721,
            4 => Self::FansCoin,
            5 => Self::Dex,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "GENERAL"),
            Self::Erc20 => write!(f, "ERC20"),
            Self::Erc777 => write!(f, "ERC777"),
            Self::Erc721 => write!(f, "ERC721"),
            Self::FansCoin => write!(f, "FANSCOIN"),
            Self::Dex => write!(f, "DEX"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Contract metadata from the contract manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub token_icon: Option<String>,
    /// JSON ABI document. Some deployments return it as a string, others
    /// inline; both are accepted.
    #[serde(default)]
    pub abi: serde_json::Value,
    #[serde(default)]
    pub type_code: i64,
}

impl Contract {
    pub fn contract_type(&self) -> ContractType {
        ContractType::from_type_code(self.type_code)
    }

    /// The ABI as a JSON string, whichever form the server used.
    pub fn abi_json(&self) -> String {
        match &self.abi {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenWithBalance {
    #[serde(flatten)]
    pub contract: Contract,
    #[serde(default)]
    pub balance: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenWithBalanceList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub list: Vec<TokenWithBalance>,
}

// ==============================================================================
// Node-side Transactions
// ==============================================================================

/// A transaction as reported by the node (mined or pending in its pool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTransaction {
    pub hash: H256,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub gas: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    /// `None` until the transaction is packed into a block.
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A fully populated transaction, ready for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub storage_limit: u64,
    pub epoch_height: u64,
    pub chain_id: u32,
}
