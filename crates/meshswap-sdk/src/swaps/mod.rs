//! Drives cross-chain atomic-swap settlement for matches the order book
//! reports. Consumes `HoldController`/`SwapInitiator` from
//! `orderbook::commands` rather than depending on `OrderBook` directly.

pub mod deal;
pub mod error;
pub mod recovery;
pub mod state_machine;

pub use deal::{build_maker_deal, build_taker_deal, from_record, order_is_own, to_record};
pub use error::SwapError;
pub use recovery::run_recovery_loop;
pub use state_machine::{SwapEvent, Swaps, SwapsConfig};
