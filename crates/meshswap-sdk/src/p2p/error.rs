use thiserror::Error;

use crate::types::NodePubKey;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("cannot attempt connection to self")]
    ConnectToSelf,

    #[error("unexpected node pubkey: observed {observed}, expected {expected}")]
    UnexpectedNodePubKey {
        observed: NodePubKey,
        expected: NodePubKey,
    },

    #[error("already connected to {0}")]
    AlreadyConnected(NodePubKey),

    #[error("peer {0} is banned")]
    Banned(NodePubKey),

    #[error("tor address rejected, tor is disabled for this node")]
    TorDisabled,

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("malformed node uri: {0}")]
    MalformedUri(String),

    #[error("unknown peer {0}")]
    UnknownPeer(NodePubKey),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("incompatible protocol version: peer runs {0}, we run {1}")]
    IncompatibleProtocolVersion(String, &'static str),
}
