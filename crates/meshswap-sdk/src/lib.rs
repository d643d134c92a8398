//! Core library for the decentralized limit-order matching and atomic-swap
//! settlement daemon. The binary crate wires these pieces to a
//! config file, an RPC surface, and a concrete persistent store; this crate
//! holds the parts that are store- and transport-agnostic.

pub mod clock;
pub mod error;
pub mod matching;
pub mod orderbook;
pub mod p2p;
pub mod swap_client;
pub mod swaps;
pub mod types;

pub use clock::{Clock, SystemClock, TestClock};
pub use error::{Result, SdkError};
