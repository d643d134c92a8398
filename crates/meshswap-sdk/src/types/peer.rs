use std::fmt;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// secp256k1 public key identifying a node on the network, analogous to the
/// teacher's `nostr_sdk::Keys` identity. Identity here is asserted, not
/// proven: a `Hello` carries this key but nothing over the wire is signed, so
/// a peer's claimed identity is only as trustworthy as the transport it
/// arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePubKey(#[serde(with = "pubkey_bytes")] pub PublicKey);

impl NodePubKey {
    pub fn from_public_key(key: PublicKey) -> Self {
        Self(key)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }
}

impl fmt::Display for NodePubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

mod pubkey_bytes {
    use secp256k1::PublicKey;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &PublicKey, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_bytes(&key.serialize())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<PublicKey, D::Error> {
        let bytes: Vec<u8> = Vec::deserialize(de)?;
        PublicKey::from_slice(&bytes).map_err(D::Error::custom)
    }
}

/// Connection lifecycle state for a peer in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    AwaitingHandshake,
    Connected,
    Disconnecting,
    Disconnected,
}

/// Why a peer connection was torn down; carried on disconnect events so the
/// order book knows whether to keep the peer's orders around for a
/// reconnect window or purge them immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    HandshakeFailed,
    HandshakeTimeout,
    ConnectionLost,
    Banned,
    DuplicateConnection,
    SelfConnection,
}

impl DisconnectReason {
    /// Reconnects are attempted for transient reasons, never for a ban or a
    /// self-connection.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DisconnectReason::ConnectionLost
                | DisconnectReason::HandshakeTimeout
                | DisconnectReason::Requested
        )
    }
}
