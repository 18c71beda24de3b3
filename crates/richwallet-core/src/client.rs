//! Wallet-level queries combining the node with the scan backend and the
//! contract manager.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::builder::transfer_call_data;
use crate::config::{EnrichConfig, ServerConfig};
use crate::enrich::BatchEnricher;
use crate::error::CoreError;
use crate::rpc::NodeRpc;
use crate::scan::{describe_params, ScanServer};
use crate::types::{
    Address, Contract, NodeTransaction, TokenTransferEventList, TokenWithBalanceList,
    TransactionList, UnsignedTransaction, U256,
};

/// Maximum number of token contracts whose metadata is kept in memory.
const CONTRACT_CACHE_CAP: usize = 256;

/// Node method listing the local node's pending transactions.
const TRANSACTIONS_FROM_POOL_METHOD: &str = "getTransactionsFromPool";

/// Wallet client backed by a node plus the two centralized servers.
pub struct RichClient {
    scan_backend: ScanServer,
    contract_manager: ScanServer,
    config: ServerConfig,
    node: Arc<dyn NodeRpc>,
    enricher: BatchEnricher,
    /// Transfer metadata (`abi,typeCode`) by token address. Contract code
    /// does not change after deployment, so entries are only evicted.
    contracts: Mutex<LruCache<Address, Contract>>,
}

impl RichClient {
    pub fn new(
        node: Arc<dyn NodeRpc>,
        config: ServerConfig,
        enrich: EnrichConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let scan_backend = ScanServer::new(config.scan_backend.clone())?;
        let contract_manager = ScanServer::new(config.contract_manager.clone())?;
        Ok(Self::from_parts(
            node,
            config,
            enrich,
            scan_backend,
            contract_manager,
        ))
    }

    /// Assemble a client from pre-built servers, e.g. sharing one HTTP pool.
    pub fn from_parts(
        node: Arc<dyn NodeRpc>,
        config: ServerConfig,
        enrich: EnrichConfig,
        scan_backend: ScanServer,
        contract_manager: ScanServer,
    ) -> Self {
        let enricher = BatchEnricher::new(Arc::clone(&node), enrich);
        Self {
            scan_backend,
            contract_manager,
            config,
            node,
            enricher,
            contracts: Mutex::new(LruCache::new(
                NonZeroUsize::new(CONTRACT_CACHE_CAP).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn node(&self) -> &Arc<dyn NodeRpc> {
        &self.node
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Transfers touching `address`, each with its block hash and revert
    /// rate.
    ///
    /// With `token_identifier` set, lists that token's transfer events;
    /// otherwise lists native-coin transactions. Fails as a whole if any
    /// record cannot be enriched.
    pub async fn get_account_token_transfers(
        &self,
        address: &Address,
        token_identifier: Option<&Address>,
        page: u32,
        page_size: u32,
    ) -> Result<TokenTransferEventList, CoreError> {
        let mut params = vec![
            ("address", format!("{address:?}")),
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("txType", "all".to_owned()),
        ];

        let mut events = match token_identifier {
            Some(token) => {
                params.push(("contractAddress", format!("{token:?}")));
                let path = &self.config.account_token_tx_list_path;
                self.scan_backend
                    .get::<TokenTransferEventList>(path, &params)
                    .await
                    .map_err(|e| scan_context(e, "cfx scan backend", path, &params))?
            }
            None => {
                let path = &self.config.tx_list_path;
                let txs: TransactionList = self
                    .scan_backend
                    .get(path, &params)
                    .await
                    .map_err(|e| scan_context(e, "cfx scan backend", path, &params))?;
                debug!(count = txs.list.len(), "fetched native transactions");
                txs.to_token_transfer_event_list()
            }
        };

        info!(
            ?address,
            records = events.list.len(),
            concurrency = self.enricher.config().concurrency.get(),
            "enriching transfers"
        );
        self.enricher.enrich(&mut events.list).await?;
        Ok(events)
    }

    /// Build an unsigned transaction sending `amount` to `to`.
    ///
    /// Without `token_identifier` this is a plain value transfer. Otherwise
    /// the token's ABI and type are fetched from the contract manager and
    /// the transaction calls the token contract, with `to` as the
    /// recipient argument.
    pub async fn create_send_token_transaction(
        &self,
        from: &Address,
        to: &Address,
        amount: U256,
        token_identifier: Option<&Address>,
    ) -> Result<UnsignedTransaction, CoreError> {
        let Some(token) = token_identifier else {
            return self
                .node
                .create_unsigned_transaction(from, to, Some(amount), None)
                .await
                .map_err(|e| {
                    e.context(format!(
                        "create unsigned transaction by from {{{from:?}}}, to {{{to:?}}}, amount {{{amount}}}"
                    ))
                });
        };

        let info = self.transfer_metadata(token).await?;
        let contract_type = info.contract_type();
        let contract = self
            .node
            .get_contract(&info.abi_json(), Some(token))
            .map_err(|e| e.context(format!("get contract by ABI of token {token:?}")))?;

        let data = transfer_call_data(contract_type, &contract, to, amount).map_err(|e| {
            e.context(format!(
                "get data for transfer token method, contract type {contract_type}"
            ))
        })?;
        debug!(?token, %contract_type, data_len = data.len(), "encoded token transfer");

        self.node
            .create_unsigned_transaction(from, token, None, Some(data))
            .await
            .map_err(|e| {
                e.context(format!(
                    "create transaction with params {{from: {from:?}, to: {token:?}}}"
                ))
            })
    }

    async fn transfer_metadata(&self, token: &Address) -> Result<Contract, CoreError> {
        if let Some(cached) = self.contracts.lock().await.get(token).cloned() {
            return Ok(cached);
        }

        let params = [
            ("address", format!("{token:?}")),
            ("fields", "abi,typeCode".to_owned()),
        ];
        let path = &self.config.contract_query_path;
        let contract: Contract = self
            .contract_manager
            .get(path, &params)
            .await
            .map_err(|e| scan_context(e, "contract manager", path, &params))?;

        self.contracts
            .lock()
            .await
            .put(*token, contract.clone());
        Ok(contract)
    }

    /// Full contract metadata for a token.
    pub async fn get_token_by_identifier(&self, token: &Address) -> Result<Contract, CoreError> {
        let params = [("address", format!("{token:?}"))];
        let path = &self.config.contract_query_path;
        self.contract_manager
            .get(path, &params)
            .await
            .map_err(|e| scan_context(e, "contract manager", path, &params))
    }

    /// Coin balance and every token balance held by `account`.
    pub async fn get_account_tokens(
        &self,
        account: &Address,
    ) -> Result<TokenWithBalanceList, CoreError> {
        let params = [("address", format!("{account:?}"))];
        let path = &self.config.account_balances_path;
        self.contract_manager
            .get(path, &params)
            .await
            .map_err(|e| scan_context(e, "contract manager", path, &params))
    }

    /// Pending transactions in the connected node's pool. Only local nodes
    /// expose this; `None` when the node reports nothing.
    pub async fn get_transactions_from_pool(
        &self,
    ) -> Result<Option<Vec<NodeTransaction>>, CoreError> {
        let raw = self
            .node
            .call_rpc(TRANSACTIONS_FROM_POOL_METHOD, Vec::new())
            .await
            .map_err(|e| e.context(format!("rpc {TRANSACTIONS_FROM_POOL_METHOD}")))?;
        if raw.is_null() {
            return Ok(None);
        }
        let txs: Vec<NodeTransaction> = serde_json::from_value(raw).map_err(|e| {
            CoreError::from(e).context(format!("decode {TRANSACTIONS_FROM_POOL_METHOD} result"))
        })?;
        Ok(Some(txs))
    }
}

fn scan_context(err: CoreError, server: &str, path: &str, params: &[(&str, String)]) -> CoreError {
    err.context(format!(
        "get result of {server} server and path {{{path}}}, params: {{{}}}",
        describe_params(params)
    ))
}
