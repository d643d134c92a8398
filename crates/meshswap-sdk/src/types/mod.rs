pub mod currency;
pub mod order;
pub mod pair;
pub mod peer;
pub mod swap_deal;

pub use currency::{Currency, SwapClientKind};
pub use order::{Order, OrderId, OrderInvariantError, OrderSource, Side, LocalId};
pub use pair::{Pair, PairId};
pub use peer::{DisconnectReason, NodePubKey, PeerState};
pub use swap_deal::{Hash32, SwapDeal, SwapPhase, SwapRole, SwapState};
