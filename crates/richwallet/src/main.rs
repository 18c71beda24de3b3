mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use serde::Serialize;

use richwallet_core::rpc::{HttpNodeClient, NodeRpc};
use richwallet_core::{EnrichConfig, RichClient, ServerConfig, ServerConfigOverrides};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let file_overrides = match &args.server_config {
        Some(path) => load_server_overrides(path)?,
        None => ServerConfigOverrides::default(),
    };
    let server_config =
        ServerConfig::from_overrides(&file_overrides.merge(args.servers.to_overrides()))
            .context("resolve server configuration")?;
    tracing::info!(
        scan_backend = %server_config.scan_backend.address,
        contract_manager = %server_config.contract_manager.address,
        "using servers"
    );

    let enrich = EnrichConfig::new(args.concurrency)
        .and_then(|c| c.with_call_timeout(Duration::from_secs(args.call_timeout_secs)))
        .context("resolve enrichment settings")?
        .with_schedule(args.schedule.into());

    let node: Arc<dyn NodeRpc> = Arc::new(
        HttpNodeClient::new(
            &args.rpc_url,
            args.rpc_user.as_deref(),
            args.rpc_pass.as_deref(),
            args.rpc_requests_per_second,
        )
        .with_context(|| format!("configure node RPC client for `{}`", args.rpc_url))?,
    );
    let client =
        RichClient::new(node, server_config, enrich).context("construct wallet client")?;

    match args.command {
        Command::Transfers {
            address,
            token,
            page,
            page_size,
        } => {
            let events = client
                .get_account_token_transfers(&address, token.as_ref(), page, page_size)
                .await
                .context("list account transfers")?;
            print_json(&events)
        }
        Command::Token { address } => {
            let token = client
                .get_token_by_identifier(&address)
                .await
                .context("query token metadata")?;
            print_json(&token)
        }
        Command::Balances { address } => {
            let tokens = client
                .get_account_tokens(&address)
                .await
                .context("query account balances")?;
            print_json(&tokens)
        }
        Command::SendToken {
            from,
            to,
            amount,
            token,
        } => {
            let tx = client
                .create_send_token_transaction(&from, &to, amount, token.as_ref())
                .await
                .context("build send transaction")?;
            print_json(&tx)
        }
        Command::Pool => {
            let pool = client
                .get_transactions_from_pool()
                .await
                .context("list pool transactions")?;
            print_json(&pool.unwrap_or_default())
        }
    }
}

fn load_server_overrides(path: &Path) -> eyre::Result<ServerConfigOverrides> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read server config `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parse server config `{}`", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}
