//! Owns per-pair matching engines and the local/global order id maps
//!. Talks to `Swaps` only through the `SwapInitiator`/
//! `HoldController` command interfaces in `commands.rs`, never directly.

pub mod book;
pub mod commands;
pub mod error;
pub mod events;

pub use book::OrderBook;
pub use commands::{HoldController, SwapInitiator};
pub use error::OrderBookError;
pub use events::OrderBookEvent;
