//! Per-pair crossing engine. Each trading pair owns one
//! `MatchingEngine`; the owning `OrderBook` serializes access to it with a
//! per-pair lock so a match-and-place operation runs end-to-end without
//! interleaving.

pub mod engine;
pub mod error;
mod queues;

pub use engine::{Match, MatchOutcome, MatchingEngine};
pub use error::MatchError;
