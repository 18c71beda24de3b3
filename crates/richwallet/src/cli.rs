use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use richwallet_core::types::{parse_address, parse_amount, Address, U256};
use richwallet_core::{Schedule, ServerConfigOverrides};

/// richwallet: wallet queries over a node RPC endpoint plus the scan
/// backend and contract manager.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Node JSON-RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:12537", env = "RICHWALLET_RPC_URL")]
    pub rpc_url: String,

    /// RPC username (optional).
    #[arg(long, env = "RICHWALLET_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password (optional).
    #[arg(long, env = "RICHWALLET_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Cap on outbound node RPC requests per second.
    #[arg(long, env = "RICHWALLET_RPC_REQUESTS_PER_SECOND")]
    pub rpc_requests_per_second: Option<u32>,

    /// JSON file with server settings (`cfxScanBackendAddress`, ...).
    /// Flags below override it field by field.
    #[arg(long, env = "RICHWALLET_SERVER_CONFIG")]
    pub server_config: Option<PathBuf>,

    #[command(flatten)]
    pub servers: ServerArgs,

    /// Maximum concurrent node calls while enriching transfers.
    #[arg(long, default_value = "10", env = "RICHWALLET_CONCURRENCY")]
    pub concurrency: usize,

    /// Per-call timeout while enriching transfers, in seconds.
    #[arg(
        long,
        default_value = "30",
        env = "RICHWALLET_CALL_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub call_timeout_secs: u64,

    /// How enrichment tasks are scheduled.
    #[arg(long, value_enum, default_value_t = ScheduleArg::Waves)]
    pub schedule: ScheduleArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Default)]
pub struct ServerArgs {
    /// Scan backend scheme (http or https).
    #[arg(long, env = "RICHWALLET_SCAN_BACKEND_SCHEME")]
    pub scan_backend_scheme: Option<String>,

    /// Scan backend host:port.
    #[arg(long, env = "RICHWALLET_SCAN_BACKEND_ADDRESS")]
    pub scan_backend_address: Option<String>,

    /// Contract manager scheme (http or https).
    #[arg(long, env = "RICHWALLET_CONTRACT_MANAGER_SCHEME")]
    pub contract_manager_scheme: Option<String>,

    /// Contract manager host:port.
    #[arg(long, env = "RICHWALLET_CONTRACT_MANAGER_ADDRESS")]
    pub contract_manager_address: Option<String>,

    #[arg(long)]
    pub account_balances_path: Option<String>,

    #[arg(long)]
    pub account_token_tx_list_path: Option<String>,

    #[arg(long)]
    pub tx_list_path: Option<String>,

    #[arg(long)]
    pub contract_query_path: Option<String>,
}

impl ServerArgs {
    pub fn to_overrides(&self) -> ServerConfigOverrides {
        ServerConfigOverrides {
            cfx_scan_backend_scheme: self.scan_backend_scheme.clone(),
            cfx_scan_backend_address: self.scan_backend_address.clone(),
            contract_manager_scheme: self.contract_manager_scheme.clone(),
            contract_manager_address: self.contract_manager_address.clone(),
            account_balances_path: self.account_balances_path.clone(),
            account_token_tx_list_path: self.account_token_tx_list_path.clone(),
            tx_list_path: self.tx_list_path.clone(),
            contract_query_path: self.contract_query_path.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ScheduleArg {
    Waves,
    Streaming,
}

impl From<ScheduleArg> for Schedule {
    fn from(arg: ScheduleArg) -> Self {
        match arg {
            ScheduleArg::Waves => Schedule::Waves,
            ScheduleArg::Streaming => Schedule::Streaming,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// List transfers of an account, enriched with block hash and revert rate.
    Transfers {
        #[arg(value_parser = parse_address)]
        address: Address,

        /// Token contract; omit for native-coin transfers.
        #[arg(long, value_parser = parse_address)]
        token: Option<Address>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        page_size: u32,
    },

    /// Show metadata of a token contract.
    Token {
        #[arg(value_parser = parse_address)]
        address: Address,
    },

    /// Show coin and token balances of an account.
    Balances {
        #[arg(value_parser = parse_address)]
        address: Address,
    },

    /// Build an unsigned transaction sending coin or tokens.
    SendToken {
        #[arg(long, value_parser = parse_address)]
        from: Address,

        #[arg(long, value_parser = parse_address)]
        to: Address,

        /// Amount in the smallest unit, decimal or 0x-prefixed hex.
        #[arg(long, value_parser = parse_amount)]
        amount: U256,

        /// Token contract; omit to send native coin.
        #[arg(long, value_parser = parse_address)]
        token: Option<Address>,
    },

    /// List pending transactions in the local node's pool.
    Pool,
}
