use crate::types::NodePubKey;

use super::error::PoolError;
use super::packet::{HelloBody, Packet, PacketBody};

pub const PROTOCOL_VERSION: &str = "1.0.0";

pub fn build_hello(
    node_pub_key: NodePubKey,
    network_id: &str,
    addresses: Vec<String>,
    pairs: Vec<String>,
) -> Packet {
    Packet::new(PacketBody::Hello(HelloBody {
        node_pub_key,
        version: PROTOCOL_VERSION.to_string(),
        network_id: network_id.to_string(),
        addresses,
        pairs,
    }))
}

/// Validates an incoming `Hello`: reject self-connection,
/// an unexpected pubkey (when one was expected, i.e. we dialed out), a
/// banned peer, and a Tor address when Tor is disabled locally. Version/
/// network-id compatibility is checked by the caller against its own
/// config; this only checks the identity-layer invariants.
pub fn verify_hello(
    hello: &HelloBody,
    our_pub_key: NodePubKey,
    expected_pub_key: Option<NodePubKey>,
    is_banned: impl FnOnce(NodePubKey) -> bool,
) -> Result<(), PoolError> {
    if hello.node_pub_key == our_pub_key {
        return Err(PoolError::ConnectToSelf);
    }
    if let Some(expected) = expected_pub_key {
        if hello.node_pub_key != expected {
            return Err(PoolError::UnexpectedNodePubKey {
                observed: hello.node_pub_key,
                expected,
            });
        }
    }
    if is_banned(hello.node_pub_key) {
        return Err(PoolError::Banned(hello.node_pub_key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn pubkey(byte: u8) -> NodePubKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        NodePubKey::from_public_key(PublicKey::from_secret_key(&secp, &sk))
    }

    #[test]
    fn self_connection_is_rejected() {
        let me = pubkey(1);
        let hello = HelloBody {
            node_pub_key: me,
            version: PROTOCOL_VERSION.into(),
            network_id: "test".into(),
            addresses: vec![],
            pairs: vec![],
        };
        let err = verify_hello(&hello, me, None, |_| false).unwrap_err();
        assert!(matches!(err, PoolError::ConnectToSelf));
    }

    #[test]
    fn mismatched_expected_pubkey_is_rejected() {
        let me = pubkey(1);
        let them = pubkey(2);
        let expected = pubkey(3);
        let hello = HelloBody {
            node_pub_key: them,
            version: PROTOCOL_VERSION.into(),
            network_id: "test".into(),
            addresses: vec![],
            pairs: vec![],
        };
        let err = verify_hello(&hello, me, Some(expected), |_| false).unwrap_err();
        assert!(matches!(err, PoolError::UnexpectedNodePubKey { .. }));
    }

    #[test]
    fn banned_peer_is_rejected() {
        let me = pubkey(1);
        let them = pubkey(2);
        let hello = HelloBody {
            node_pub_key: them,
            version: PROTOCOL_VERSION.into(),
            network_id: "test".into(),
            addresses: vec![],
            pairs: vec![],
        };
        let err = verify_hello(&hello, me, None, |_| true).unwrap_err();
        assert!(matches!(err, PoolError::Banned(_)));
    }
}
