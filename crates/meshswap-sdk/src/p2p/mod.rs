//! Gossip network: peer connections, wire framing, handshake, reconnect
//! backoff, and reputation scoring.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod packet;
pub mod peer;
pub mod pool;
pub mod reconnect;
pub mod reputation;

pub use codec::PacketCodec;
pub use error::PoolError;
pub use packet::{
    DisconnectCode, Packet, PacketBody, SwapAcceptedBody, SwapCompleteBody, SwapFailedBody,
    SwapRequestBody, WireOrder,
};
pub use peer::PeerHandle;
pub use pool::{Pool, PoolEvent};
pub use reconnect::Backoff;
pub use reputation::{ReputationConfig, ReputationEvent};
