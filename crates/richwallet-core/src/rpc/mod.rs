//! Node RPC abstraction layer.
//!
//! Defines the [`NodeRpc`] trait and provides an HTTP JSON-RPC
//! implementation ([`HttpNodeClient`]) plus a test mock (`mock::MockNode`).

mod http_adapter;
#[cfg(test)]
pub mod mock;

pub use http_adapter::HttpNodeClient;

use async_trait::async_trait;

use crate::abi::ContractAbi;
use crate::error::CoreError;
use crate::types::{Address, NodeTransaction, UnsignedTransaction, H256, U256};

/// The node methods the wallet client needs.
///
/// Implementations are expected to handle connection management and
/// response decoding internally.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Fetch a transaction by hash. `None` if the node does not know it.
    async fn get_transaction_by_hash(
        &self,
        hash: &H256,
    ) -> Result<Option<NodeTransaction>, CoreError>;

    /// Probability that the block gets reverted, in `[0, 1]`. `None` when
    /// the node reports no risk figure for the block.
    async fn get_block_revert_rate_by_hash(
        &self,
        block_hash: &H256,
    ) -> Result<Option<f64>, CoreError>;

    /// Build a transaction with nonce, gas, storage and epoch filled in
    /// from the node's current state.
    async fn create_unsigned_transaction(
        &self,
        from: &Address,
        to: &Address,
        value: Option<U256>,
        data: Option<Vec<u8>>,
    ) -> Result<UnsignedTransaction, CoreError>;

    /// Call an arbitrary JSON-RPC method and return the raw result.
    async fn call_rpc(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError>;

    /// Bind an ABI to a contract address for call encoding.
    fn get_contract(&self, abi: &str, address: Option<&Address>) -> Result<ContractAbi, CoreError> {
        ContractAbi::from_json(abi, address.copied())
    }

    /// Hash of the block containing `tx_hash`, or `None` if the
    /// transaction is not mined yet.
    async fn resolve_block_of_transaction(
        &self,
        tx_hash: &H256,
    ) -> Result<Option<H256>, CoreError> {
        match self.get_transaction_by_hash(tx_hash).await? {
            Some(tx) => Ok(tx.block_hash),
            None => Err(CoreError::TxNotFound(*tx_hash)),
        }
    }

    /// Confirmation confidence for a mined block, expressed as revert rate.
    async fn resolve_block_confidence(&self, block_hash: &H256) -> Result<Option<f64>, CoreError> {
        self.get_block_revert_rate_by_hash(block_hash).await
    }
}
