use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{CoreError, RpcError};
use crate::types::{Address, NodeTransaction, UnsignedTransaction, H256, U256};

use super::NodeRpc;

/// One observed call to the mock, with wall-clock bounds.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub method: &'static str,
    pub key: String,
    pub started: Instant,
    pub finished: Instant,
}

/// A mock node for testing. Returns canned block hashes and revert rates
/// from maps populated via the builder pattern, optionally after a delay,
/// and records every call it serves.
pub struct MockNode {
    blocks: HashMap<H256, Option<H256>>,
    revert_rates: HashMap<H256, Option<f64>>,
    tx_failures: HashMap<H256, String>,
    tx_panics: HashMap<H256, String>,
    block_failures: HashMap<H256, String>,
    pool: serde_json::Value,
    delay: Duration,
    calls: Mutex<Vec<CallRecord>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockNode {
    pub fn builder() -> MockNodeBuilder {
        MockNodeBuilder {
            blocks: HashMap::new(),
            revert_rates: HashMap::new(),
            tx_failures: HashMap::new(),
            tx_panics: HashMap::new(),
            block_failures: HashMap::new(),
            pool: serde_json::Value::Null,
            delay: Duration::ZERO,
        }
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<CallRecord> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Highest number of concurrent transaction lookups observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn observe<T>(
        &self,
        method: &'static str,
        key: String,
        gauge: bool,
        result: T,
    ) -> T {
        let started = Instant::now();
        if gauge {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if gauge {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        self.calls.lock().expect("call log poisoned").push(CallRecord {
            method,
            key,
            started,
            finished: Instant::now(),
        });
        result
    }
}

pub struct MockNodeBuilder {
    blocks: HashMap<H256, Option<H256>>,
    revert_rates: HashMap<H256, Option<f64>>,
    tx_failures: HashMap<H256, String>,
    tx_panics: HashMap<H256, String>,
    block_failures: HashMap<H256, String>,
    pool: serde_json::Value,
    delay: Duration,
}

impl MockNodeBuilder {
    /// A known transaction, mined into `block` (or pending if `None`).
    pub fn with_tx(mut self, tx: H256, block: Option<H256>) -> Self {
        self.blocks.insert(tx, block);
        self
    }

    pub fn with_revert_rate(mut self, block: H256, rate: Option<f64>) -> Self {
        self.revert_rates.insert(block, rate);
        self
    }

    pub fn failing_tx(mut self, tx: H256, message: &str) -> Self {
        self.tx_failures.insert(tx, message.to_owned());
        self
    }

    /// Lookups of `tx` panic with `message` after the configured delay.
    pub fn panicking_tx(mut self, tx: H256, message: &str) -> Self {
        self.tx_panics.insert(tx, message.to_owned());
        self
    }

    pub fn failing_block(mut self, block: H256, message: &str) -> Self {
        self.block_failures.insert(block, message.to_owned());
        self
    }

    pub fn with_pool(mut self, pool: serde_json::Value) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn build(self) -> MockNode {
        MockNode {
            blocks: self.blocks,
            revert_rates: self.revert_rates,
            tx_failures: self.tx_failures,
            tx_panics: self.tx_panics,
            block_failures: self.block_failures,
            pool: self.pool,
            delay: self.delay,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

fn server_error(message: &str) -> CoreError {
    CoreError::Rpc(RpcError::ServerError {
        code: -32000,
        message: message.to_owned(),
    })
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn get_transaction_by_hash(
        &self,
        hash: &H256,
    ) -> Result<Option<NodeTransaction>, CoreError> {
        let result = if let Some(message) = self.tx_failures.get(hash) {
            Err(server_error(message))
        } else {
            Ok(self.blocks.get(hash).map(|block| NodeTransaction {
                hash: *hash,
                from: Address::repeat_byte(0x10),
                to: None,
                value: None,
                nonce: None,
                gas_price: None,
                gas: None,
                data: None,
                block_hash: *block,
                status: None,
            }))
        };
        let result = self
            .observe("get_transaction_by_hash", format!("{hash:?}"), true, result)
            .await;
        if let Some(message) = self.tx_panics.get(hash) {
            panic!("{message}");
        }
        result
    }

    async fn get_block_revert_rate_by_hash(
        &self,
        block_hash: &H256,
    ) -> Result<Option<f64>, CoreError> {
        let result = match self.block_failures.get(block_hash) {
            Some(message) => Err(server_error(message)),
            None => Ok(self.revert_rates.get(block_hash).copied().flatten()),
        };
        self.observe(
            "get_block_revert_rate_by_hash",
            format!("{block_hash:?}"),
            false,
            result,
        )
        .await
    }

    async fn create_unsigned_transaction(
        &self,
        from: &Address,
        to: &Address,
        value: Option<U256>,
        data: Option<Vec<u8>>,
    ) -> Result<UnsignedTransaction, CoreError> {
        let tx = UnsignedTransaction {
            from: *from,
            to: *to,
            value: value.unwrap_or_default(),
            data: data.unwrap_or_default().into(),
            nonce: 7,
            gas_price: U256::one(),
            gas: 21_000,
            storage_limit: 0,
            epoch_height: 100,
            chain_id: 1,
        };
        self.observe("create_unsigned_transaction", format!("{to:?}"), false, Ok(tx))
            .await
    }

    async fn call_rpc(
        &self,
        method: &str,
        _params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError> {
        let result = match method {
            "getTransactionsFromPool" => Ok(self.pool.clone()),
            other => Err(CoreError::Rpc(RpcError::ServerError {
                code: -32601,
                message: format!("Method not found: {other}"),
            })),
        };
        self.observe("call_rpc", method.to_owned(), false, result)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hash;

    #[tokio::test]
    async fn resolves_known_unknown_and_pending_transactions() {
        let rpc = MockNode::builder()
            .with_tx(hash(1), Some(hash(101)))
            .with_tx(hash(2), None)
            .build();

        assert_eq!(
            rpc.resolve_block_of_transaction(&hash(1)).await.unwrap(),
            Some(hash(101))
        );
        assert_eq!(rpc.resolve_block_of_transaction(&hash(2)).await.unwrap(), None);
        assert!(matches!(
            rpc.resolve_block_of_transaction(&hash(3)).await,
            Err(CoreError::TxNotFound(h)) if h == hash(3)
        ));
        assert_eq!(rpc.calls_to("get_transaction_by_hash").len(), 3);
    }

    #[tokio::test]
    async fn unknown_method_is_server_error() {
        let rpc = MockNode::builder().build();
        let err = rpc.call_rpc("cfx_nope", Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("Method not found"));
    }
}
