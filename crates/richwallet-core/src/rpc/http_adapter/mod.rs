//! Native JSON-RPC client for the node.
//!
//! Implements [`NodeRpc`](super::NodeRpc) over JSON-RPC using `reqwest`,
//! with optional basic auth and request rate limiting.

mod client;
mod endpoint;
mod parsing;
mod protocol;

pub use client::HttpNodeClient;
