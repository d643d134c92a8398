use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::types::{NodePubKey, PeerState};

use super::error::PoolError;
use super::packet::Packet;

/// A handle to one peer connection, held by the `Pool` and handed out to
/// the order book / RPC layer for sending packets. The actual socket is
/// owned by a pair of reader/writer tasks spawned when the connection is
/// established; this handle only has a channel into the writer task.
pub struct PeerHandle {
    pub pub_key: NodePubKey,
    pub address: String,
    pub outbound: bool,
    pub pairs: RwLock<Vec<String>>,
    state: RwLock<PeerState>,
    sender: mpsc::UnboundedSender<Packet>,
}

impl PeerHandle {
    pub fn new(
        pub_key: NodePubKey,
        address: String,
        outbound: bool,
        pairs: Vec<String>,
        sender: mpsc::UnboundedSender<Packet>,
    ) -> Self {
        Self {
            pub_key,
            address,
            outbound,
            pairs: RwLock::new(pairs),
            state: RwLock::new(PeerState::Connected),
            sender,
        }
    }

    pub fn state(&self) -> PeerState {
        *self.state.read()
    }

    pub fn set_state(&self, state: PeerState) {
        *self.state.write() = state;
    }

    pub fn advertises_pair(&self, pair_id: &str) -> bool {
        self.pairs.read().iter().any(|p| p == pair_id)
    }

    pub fn send(&self, packet: Packet) -> Result<(), PoolError> {
        self.sender
            .send(packet)
            .map_err(|_| PoolError::UnknownPeer(self.pub_key))
    }
}
