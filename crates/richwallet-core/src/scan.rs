//! HTTP client for the centralized scan backend and contract manager.
//!
//! Both servers wrap every payload in the same `{code, message, result}`
//! envelope. The `result` shape differs per endpoint, so it is decoded in
//! two stages: the envelope into a generic JSON value, then that value
//! re-serialized and decoded into the endpoint's payload type.

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::config::ServerEndpoint;
use crate::error::CoreError;

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// One centralized server: where it lives and the HTTP client used to
/// reach it.
#[derive(Debug, Clone)]
pub struct ScanServer {
    endpoint: ServerEndpoint,
    client: reqwest::Client,
}

impl ScanServer {
    pub fn new(endpoint: ServerEndpoint) -> Result<Self, CoreError> {
        endpoint.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CoreError::Transport)?;
        Ok(Self::with_client(endpoint, client))
    }

    /// Use a caller-supplied HTTP client (shared pools, custom TLS, tests).
    pub fn with_client(endpoint: ServerEndpoint, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }

    /// Build `scheme://address/path?params`, percent-encoding the query.
    pub fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, CoreError> {
        let base = format!("{}://{}{}", self.endpoint.scheme, self.endpoint.address, path);
        let mut url = Url::parse(&base)
            .map_err(|e| CoreError::InvalidConfig(format!("invalid server url `{base}`: {e}")))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET `path` and decode the envelope's `result` into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let url = self.url(path, params)?;
        debug!(%url, "scan request");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(%url, %status, body_len = body.len(), "scan response");
        trace!(%url, body = %String::from_utf8_lossy(&body), "scan response body");
        if !status.is_success() {
            warn!(%url, %status, "scan server returned non-success status");
        }

        decode_envelope(&body)
    }
}

fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, CoreError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    if envelope.code != 0 {
        return Err(CoreError::Application {
            code: envelope.code,
            message: envelope.message,
        });
    }

    let result = serde_json::to_vec(&envelope.result)?;
    Ok(serde_json::from_slice(&result)?)
}

/// Render query parameters for error context, in request order.
pub(crate) fn describe_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
