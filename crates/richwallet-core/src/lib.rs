pub mod abi;
pub mod builder;
pub mod client;
pub mod config;
pub mod enrich;
pub mod error;
pub mod rpc;
pub mod scan;
pub mod types;

#[cfg(test)]
mod test_util;

pub use client::RichClient;
pub use config::{EnrichConfig, Schedule, ServerConfig, ServerConfigOverrides};
pub use error::CoreError;
