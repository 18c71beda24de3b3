//! JSON-RPC 2.0 envelopes as spoken by the node.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, RpcError};

#[derive(Serialize)]
pub(super) struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

impl<'a> Request<'a> {
    pub(super) fn new(id: u64, method: &'a str, params: Vec<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// `{"code", "message"}` error object. Nodes sometimes send a bare string
/// or other shape instead, kept verbatim.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorObject {
    Structured { code: i64, message: String },
    Other(serde_json::Value),
}

/// Numeric ids; some nodes echo them back as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseId {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

#[derive(Deserialize)]
pub(super) struct Response {
    #[serde(default)]
    id: Option<ResponseId>,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<ErrorObject>,
}

impl Response {
    /// The call's result, or the node's error. A missing or `null` id is
    /// accepted; any other id must match `expected_id`.
    pub(super) fn into_result(self, expected_id: u64) -> Result<serde_json::Value, CoreError> {
        match self.error {
            Some(ErrorObject::Structured { code, message }) => {
                return Err(RpcError::ServerError { code, message }.into())
            }
            Some(ErrorObject::Other(raw)) if !raw.is_null() => {
                return Err(
                    RpcError::InvalidResponse(format!("non-standard JSON-RPC error: {raw}")).into(),
                )
            }
            _ => {}
        }

        let echoed = match self.id {
            None | Some(ResponseId::Other(serde_json::Value::Null)) => None,
            Some(ResponseId::Number(n)) => Some(n),
            Some(ResponseId::Text(s)) => Some(s.parse::<u64>().map_err(|e| {
                RpcError::InvalidResponse(format!("invalid response id `{s}`: {e}"))
            })?),
            Some(ResponseId::Other(raw)) => {
                return Err(RpcError::InvalidResponse(format!("invalid response id: {raw}")).into())
            }
        };
        if let Some(echoed) = echoed.filter(|echoed| *echoed != expected_id) {
            return Err(RpcError::InvalidResponse(format!(
                "response id {echoed} does not match request id {expected_id}"
            ))
            .into());
        }

        Ok(self.result)
    }
}
