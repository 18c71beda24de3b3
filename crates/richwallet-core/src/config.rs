//! Endpoint configuration for the scan backend and contract manager, and
//! tuning for the enrichment pipeline.
//!
//! Every [`ServerConfig`] field is independently optional: anything left
//! unset in a [`ServerConfigOverrides`] keeps its default. Each client owns
//! its own resolved copy, so two clients never see each other's settings.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default number of per-record enrichment tasks allowed in flight.
pub const RPC_CONCURRENCY: usize = 10;

/// Default upper bound for a single node call made by the enricher.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_ACCOUNT_BALANCES_PATH: &str = "/api/account/token/list";
pub const DEFAULT_ACCOUNT_TOKEN_TX_LIST_PATH: &str = "/future/transfer/list";
pub const DEFAULT_TX_LIST_PATH: &str = "/future/transaction/list";
pub const DEFAULT_CONTRACT_QUERY_PATH: &str = "/api/contract/query";

/// Scheme and `host:port` of one centralized server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub scheme: String,
    pub address: String,
}

impl ServerEndpoint {
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.scheme.as_str() {
            "http" | "https" => {}
            other => {
                return Err(CoreError::InvalidConfig(format!(
                    "unsupported server scheme `{other}`; expected http or https"
                )))
            }
        }
        if self.address.is_empty() || self.address.contains('/') {
            return Err(CoreError::InvalidConfig(format!(
                "server address `{}` must be a bare host[:port]",
                self.address
            )));
        }
        Ok(())
    }
}

/// Resolved configuration for both centralized servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub scan_backend: ServerEndpoint,
    pub contract_manager: ServerEndpoint,
    pub account_balances_path: String,
    pub account_token_tx_list_path: String,
    pub tx_list_path: String,
    pub contract_query_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scan_backend: ServerEndpoint {
                scheme: "http".into(),
                address: "101.201.103.131:8885".into(),
            },
            contract_manager: ServerEndpoint {
                scheme: "http".into(),
                address: "101.201.103.131:8886".into(),
            },
            account_balances_path: DEFAULT_ACCOUNT_BALANCES_PATH.into(),
            account_token_tx_list_path: DEFAULT_ACCOUNT_TOKEN_TX_LIST_PATH.into(),
            tx_list_path: DEFAULT_TX_LIST_PATH.into(),
            contract_query_path: DEFAULT_CONTRACT_QUERY_PATH.into(),
        }
    }
}

impl ServerConfig {
    /// Defaults with `overrides` applied field by field.
    pub fn from_overrides(overrides: &ServerConfigOverrides) -> Result<Self, CoreError> {
        let mut config = Self::default();
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Replace every field that `overrides` sets; empty strings count as
    /// unset.
    pub fn apply(&mut self, overrides: &ServerConfigOverrides) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                *target = v.to_owned();
            }
        }

        set(&mut self.scan_backend.scheme, &overrides.cfx_scan_backend_scheme);
        set(
            &mut self.scan_backend.address,
            &overrides.cfx_scan_backend_address,
        );
        set(
            &mut self.contract_manager.scheme,
            &overrides.contract_manager_scheme,
        );
        set(
            &mut self.contract_manager.address,
            &overrides.contract_manager_address,
        );
        set(
            &mut self.account_balances_path,
            &overrides.account_balances_path,
        );
        set(
            &mut self.account_token_tx_list_path,
            &overrides.account_token_tx_list_path,
        );
        set(&mut self.tx_list_path, &overrides.tx_list_path);
        set(&mut self.contract_query_path, &overrides.contract_query_path);
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.scan_backend.validate()?;
        self.contract_manager.validate()?;
        for path in [
            &self.account_balances_path,
            &self.account_token_tx_list_path,
            &self.tx_list_path,
            &self.contract_query_path,
        ] {
            if !path.starts_with('/') {
                return Err(CoreError::InvalidConfig(format!(
                    "server path `{path}` must start with `/`"
                )));
            }
        }
        Ok(())
    }
}

/// Optional per-field overrides, e.g. loaded from a JSON file or CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfigOverrides {
    pub cfx_scan_backend_scheme: Option<String>,
    pub cfx_scan_backend_address: Option<String>,
    pub contract_manager_scheme: Option<String>,
    pub contract_manager_address: Option<String>,
    pub account_balances_path: Option<String>,
    pub account_token_tx_list_path: Option<String>,
    pub tx_list_path: Option<String>,
    pub contract_query_path: Option<String>,
}

impl ServerConfigOverrides {
    /// Layer `other` on top of `self`: fields set in `other` win.
    pub fn merge(mut self, other: ServerConfigOverrides) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            cfx_scan_backend_scheme,
            cfx_scan_backend_address,
            contract_manager_scheme,
            contract_manager_address,
            account_balances_path,
            account_token_tx_list_path,
            tx_list_path,
            contract_query_path
        );
        self
    }
}

/// How the enricher schedules per-record tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Launch `concurrency` tasks, wait for all of them, repeat.
    #[default]
    Waves,
    /// Keep up to `concurrency` tasks in flight, starting the next record as
    /// soon as any task finishes.
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichConfig {
    pub concurrency: NonZeroUsize,
    pub call_timeout: Duration,
    pub schedule: Schedule,
}

impl EnrichConfig {
    pub fn new(concurrency: usize) -> Result<Self, CoreError> {
        let concurrency = NonZeroUsize::new(concurrency).ok_or_else(|| {
            CoreError::InvalidConfig("enrichment concurrency must be at least 1".to_owned())
        })?;
        Ok(Self {
            concurrency,
            ..Self::default()
        })
    }

    /// Per-call timeout for node lookups. Must be non-zero.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Result<Self, CoreError> {
        if timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "enrichment call timeout must be greater than zero".to_owned(),
            ));
        }
        self.call_timeout = timeout;
        Ok(self)
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: NonZeroUsize::new(RPC_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            schedule: Schedule::Waves,
        }
    }
}
