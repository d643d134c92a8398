//! Real TCP loopback connections between two `Pool`s, covering the
//! connection-lifecycle scenarios a gossip network has to get right:
//! self-connect rejection, pubkey-mismatch rejection, duplicate connect
//! rejection, and reconnect after a clean disconnect.

use std::sync::Arc;
use std::time::Duration;

use meshswap_sdk::clock::SystemClock;
use meshswap_sdk::p2p::{Pool, PoolError, PoolEvent};
use meshswap_store::MemoryStore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

fn make_pool(byte: u8, listen_addr: &str) -> (Arc<Pool>, SecretKey) {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&[byte; 32]).unwrap();
    let pool = Arc::new(Pool::new(
        secret_key,
        "testnet".into(),
        vec![listen_addr.to_string()],
        Vec::new(),
        false,
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock::new()),
    ));
    (pool, secret_key)
}

async fn spawn_listener(pool: Arc<Pool>, addr: &str) {
    let pool = pool.clone();
    let addr = addr.to_string();
    tokio::spawn(async move {
        let _ = pool.run_listener(addr).await;
    });
    // give the listener a moment to bind before anyone dials it
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn self_connect_is_rejected_before_any_socket_work() {
    let (pool, _) = make_pool(1, "127.0.0.1:0");
    let err = pool
        .add_outbound("127.0.0.1:9".into(), Some(pool.pub_key()), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::ConnectToSelf));
}

#[tokio::test]
async fn dialing_with_the_wrong_expected_pubkey_fails_the_handshake() {
    let (listener_pool, _) = make_pool(2, "127.0.0.1:18571");
    spawn_listener(listener_pool.clone(), "127.0.0.1:18571").await;

    let (dialer_pool, _) = make_pool(3, "127.0.0.1:0");
    let secp = Secp256k1::new();
    let wrong_sk = SecretKey::from_slice(&[99u8; 32]).unwrap();
    let wrong_expected =
        meshswap_sdk::types::NodePubKey::from_public_key(PublicKey::from_secret_key(&secp, &wrong_sk));

    let err = dialer_pool
        .add_outbound("127.0.0.1:18571".into(), Some(wrong_expected), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::UnexpectedNodePubKey { .. }));
}

#[tokio::test]
async fn duplicate_outbound_connect_to_an_already_connected_peer_is_rejected() {
    let (listener_pool, _) = make_pool(4, "127.0.0.1:18572");
    spawn_listener(listener_pool.clone(), "127.0.0.1:18572").await;

    let (dialer_pool, _) = make_pool(5, "127.0.0.1:0");
    let expected = listener_pool.pub_key();

    dialer_pool
        .add_outbound("127.0.0.1:18572".into(), Some(expected), false)
        .await
        .expect("first connect succeeds");

    let err = dialer_pool
        .add_outbound("127.0.0.1:18572".into(), Some(expected), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::AlreadyConnected(_)));
}

#[tokio::test]
async fn peer_can_reconnect_after_a_clean_disconnect() {
    let (listener_pool, _) = make_pool(6, "127.0.0.1:18573");
    spawn_listener(listener_pool.clone(), "127.0.0.1:18573").await;

    let (dialer_pool, _) = make_pool(7, "127.0.0.1:0");
    let expected = listener_pool.pub_key();
    let mut dialer_events = dialer_pool.subscribe();

    dialer_pool
        .add_outbound("127.0.0.1:18573".into(), Some(expected), false)
        .await
        .expect("first connect succeeds");
    assert!(matches!(
        dialer_events.recv().await.unwrap(),
        PoolEvent::PeerConnected { .. }
    ));

    dialer_pool.disconnect(expected, meshswap_sdk::p2p::DisconnectCode::Shutdown);
    assert!(matches!(
        dialer_events.recv().await.unwrap(),
        PoolEvent::PeerDisconnected { .. }
    ));

    // The listener's own peer-table entry drains asynchronously once the
    // socket actually closes; give that teardown a moment before redialing.
    tokio::time::sleep(Duration::from_millis(100)).await;

    dialer_pool
        .add_outbound("127.0.0.1:18573".into(), Some(expected), false)
        .await
        .expect("reconnect after clean disconnect succeeds");
}

#[tokio::test]
async fn outbound_peer_auto_reconnects_after_a_reconnect_worthy_disconnect() {
    let (listener_pool, _) = make_pool(8, "127.0.0.1:18574");
    spawn_listener(listener_pool.clone(), "127.0.0.1:18574").await;

    let (dialer_pool, _) = make_pool(9, "127.0.0.1:0");
    let expected = listener_pool.pub_key();
    let mut dialer_events = dialer_pool.subscribe();

    dialer_pool
        .add_outbound("127.0.0.1:18574".into(), Some(expected), false)
        .await
        .expect("first connect succeeds");
    assert!(matches!(
        dialer_events.recv().await.unwrap(),
        PoolEvent::PeerConnected { .. }
    ));

    // The listener, not the dialer, decides to tear the link down with a
    // reconnect-worthy code; only the outbound side is expected to redial.
    listener_pool.disconnect(dialer_pool.pub_key(), meshswap_sdk::p2p::DisconnectCode::Shutdown);
    assert!(matches!(
        dialer_events.recv().await.unwrap(),
        PoolEvent::PeerDisconnected { .. }
    ));

    // No manual add_outbound here: the dialer's own reconnect-with-backoff
    // logic must redial on its own.
    let reconnected = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let PoolEvent::PeerConnected { .. } = dialer_events.recv().await.unwrap() {
                return;
            }
        }
    })
    .await;
    assert!(reconnected.is_ok(), "dialer did not auto-reconnect within 10s");
}
