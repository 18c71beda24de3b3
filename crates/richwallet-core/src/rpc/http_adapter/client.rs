use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use serde_json::json;
use tracing::{debug, trace};

use crate::error::{CoreError, RpcError};
use crate::types::{Address, Bytes, NodeTransaction, UnsignedTransaction, H256, U256};

use super::super::NodeRpc;
use super::endpoint::NodeEndpoint;
use super::parsing::{
    parse_field_u64, parse_quantity_u256, parse_quantity_u64, parse_revert_rate,
    parse_transaction,
};
use super::protocol::{Request, Response};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Node JSON-RPC client over HTTP(S).
pub struct HttpNodeClient {
    client: reqwest::Client,
    endpoint: NodeEndpoint,
    limiter: Option<DirectRateLimiter>,
    next_id: AtomicU64,
}

impl HttpNodeClient {
    /// Create a new client for an `http://` or `https://` node URL.
    ///
    /// `user` and `pass` enable basic auth and must be given together.
    /// If `requests_per_second` is set, outbound calls are rate-limited.
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        requests_per_second: Option<u32>,
    ) -> Result<Self, CoreError> {
        let endpoint = NodeEndpoint::parse(connection, user, pass)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(RpcError::Transport)?;

        let limiter = match requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::InvalidConfig("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            endpoint,
            limiter,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError> {
        self.wait_for_rate_limit().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            rpc.id = id,
            rpc.method = method,
            rpc.params = params.len(),
            "rpc call"
        );
        let mut builder = self
            .client
            .post(self.endpoint.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&Request::new(id, method, params));
        if let Some(auth) = &self.endpoint.auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.pass));
        }

        let response = builder.send().await.map_err(RpcError::Transport)?;
        let status = response.status();

        let body = response.text().await.map_err(RpcError::Transport)?;
        debug!(rpc.id = id, rpc.method = method, %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response body");

        let decoded: Response = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!(
                "{method} returned HTTP {status} with undecodable body: {e}; body={body}"
            ))
        })?;
        decoded.into_result(id)
    }
}

#[async_trait]
impl NodeRpc for HttpNodeClient {
    async fn get_transaction_by_hash(
        &self,
        hash: &H256,
    ) -> Result<Option<NodeTransaction>, CoreError> {
        let raw = self
            .rpc_call("cfx_getTransactionByHash", vec![json!(hash)])
            .await?;
        parse_transaction(raw)
    }

    async fn get_block_revert_rate_by_hash(
        &self,
        block_hash: &H256,
    ) -> Result<Option<f64>, CoreError> {
        let raw = self
            .rpc_call("cfx_getConfirmationRiskByHash", vec![json!(block_hash)])
            .await?;
        parse_revert_rate(&raw)
    }

    async fn create_unsigned_transaction(
        &self,
        from: &Address,
        to: &Address,
        value: Option<U256>,
        data: Option<Vec<u8>>,
    ) -> Result<UnsignedTransaction, CoreError> {
        let value = value.unwrap_or_default();
        let data = Bytes::from(data.unwrap_or_default());
        let call_request = json!({
            "from": from,
            "to": to,
            "value": value,
            "data": &data,
        });

        let (nonce, gas_price, epoch, status, estimate) = futures::try_join!(
            self.rpc_call("cfx_getNextNonce", vec![json!(from)]),
            self.rpc_call("cfx_gasPrice", Vec::new()),
            self.rpc_call("cfx_epochNumber", vec![json!("latest_state")]),
            self.rpc_call("cfx_getStatus", Vec::new()),
            self.rpc_call("cfx_estimateGasAndCollateral", vec![call_request]),
        )?;

        let chain_id = parse_field_u64(&status, "chainId")?;
        let chain_id = u32::try_from(chain_id).map_err(|_| {
            RpcError::InvalidResponse(format!("chainId out of range: {chain_id}"))
        })?;
        let gas = match estimate.get("gasLimit") {
            Some(limit) => parse_quantity_u64(limit, "gasLimit")?,
            None => parse_field_u64(&estimate, "gasUsed")?,
        };
        let storage_limit = parse_field_u64(&estimate, "storageCollateralized")?;

        let tx = UnsignedTransaction {
            from: *from,
            to: *to,
            value,
            data,
            nonce: parse_quantity_u64(&nonce, "nonce")?,
            gas_price: parse_quantity_u256(&gas_price, "gasPrice")?,
            gas,
            storage_limit,
            epoch_height: parse_quantity_u64(&epoch, "epochNumber")?,
            chain_id,
        };
        debug!(
            from = ?tx.from,
            to = ?tx.to,
            nonce = tx.nonce,
            gas = tx.gas,
            "built unsigned transaction"
        );
        Ok(tx)
    }

    async fn call_rpc(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError> {
        self.rpc_call(method, params).await
    }
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}
