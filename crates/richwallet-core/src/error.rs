use crate::types::H256;

/// Failures talking to the node over JSON-RPC.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON-RPC server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),
}

/// One record of a batch that could not be enriched.
///
/// Keyed by position in the batch rather than by transaction hash, since a
/// page can list the same transaction more than once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EnrichItemError {
    pub index: usize,
    pub tx_hash: H256,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("code:{code}, message:{message}")]
    Application { code: i64, message: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("transaction not found: {0:?}")]
    TxNotFound(H256),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("contract ABI error: {0}")]
    Abi(String),

    #[error("{}", join_item_errors(.0))]
    BatchEnrichmentFailed(Vec<EnrichItemError>),

    #[error("do not support build data for transfer token function of contract type {0}")]
    UnsupportedContractType(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Attach a description of the failing operation (endpoint, parameters).
    pub fn context(self, context: impl Into<String>) -> Self {
        CoreError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any `Context` wrappers.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

fn join_item_errors(items: &[EnrichItemError]) -> String {
    items
        .iter()
        .map(|item| item.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
