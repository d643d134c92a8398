//! Daemon crate root: configuration, orchestration, RPC surface, and the
//! ambient logging/alerting layers wrapped around `meshswap-sdk`
//!.

pub mod alerts;
pub mod config;
pub mod daemon;
pub mod logging;
pub mod rpc;
