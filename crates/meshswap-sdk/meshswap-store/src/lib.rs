//! Persistence interfaces for the meshswap daemon.
//!
//! Relational-style storage of currencies, pairs, nodes, orders, and swap
//! deals is an external collaborator: this crate specifies the
//! interface only, plus an in-memory reference implementation.

mod error;
mod memory;
mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use traits::{
    CurrencyRecord, CurrencyStore, NodeRecord, NodeStore, OrderRecord, OrderStore, PairRecord,
    PairStore, SwapClientKind, SwapDealRecord, SwapDealStore,
};
