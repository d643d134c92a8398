use rand::RngCore;
use sha2::{Digest, Sha256};

use meshswap_store::SwapDealRecord;

use crate::matching::Match;
use crate::types::{Hash32, NodePubKey, Order, OrderSource, PairId, Side, SwapDeal, SwapPhase, SwapRole, SwapState};

use super::state_machine::SwapsConfig;

fn generate_preimage() -> Hash32 {
    let mut preimage = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut preimage);
    preimage
}

pub fn hash_preimage(preimage: Hash32) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(preimage);
    let digest = hasher.finalize();
    let mut r_hash = [0u8; 32];
    r_hash.copy_from_slice(&digest);
    r_hash
}

/// Which currency/units move in each direction, derived from which side of
/// `matched.maker` was resting.
struct Legs {
    maker_currency: String,
    taker_currency: String,
    maker_units: u64,
    taker_units: u64,
}

fn legs_for(pair: &PairId, maker: &Order, quantity: u64) -> Legs {
    let price = maker.price.unwrap_or(0.0);
    let quote_units = (quantity as f64 * price).round().max(0.0) as u64;
    if maker.side() == Side::Sell {
        // Maker is selling base for quote: maker sends base, taker sends quote.
        Legs {
            maker_currency: pair.base().to_string(),
            taker_currency: pair.quote().to_string(),
            maker_units: quantity,
            taker_units: quote_units,
        }
    } else {
        Legs {
            maker_currency: pair.quote().to_string(),
            taker_currency: pair.base().to_string(),
            maker_units: quote_units,
            taker_units: quantity,
        }
    }
}

/// Builds the deal the node that just placed a matching order (always the
/// taker, maker/taker glossary) keeps locally, generating
/// the preimage up front since the taker is the payee of the first leg and
/// must hold it before that payment can be claimed.
pub fn build_taker_deal(
    pair_id: PairId,
    matched: &Match,
    peer_pub_key: NodePubKey,
    config: &SwapsConfig,
    now_ms: i64,
) -> (SwapDeal, Hash32) {
    let preimage = generate_preimage();
    let r_hash = hash_preimage(preimage);
    let legs = legs_for(&pair_id, &matched.maker, matched.quantity);
    let deal = SwapDeal {
        r_hash,
        r_preimage: Some(preimage),
        role: SwapRole::Taker,
        phase: SwapPhase::Created,
        state: SwapState::Active,
        pair_id,
        quantity: matched.quantity,
        price: matched.maker.price.unwrap_or(0.0),
        peer_pub_key,
        maker_currency: legs.maker_currency,
        taker_currency: legs.taker_currency,
        maker_units: legs.maker_units,
        taker_units: legs.taker_units,
        maker_cltv_delta: 0,
        taker_cltv_delta: config.base_cltv_delta + config.cltv_safety_margin + config.cltv_margin_buffer,
        maker_order_id: matched.maker_order_id,
        taker_order_id: matched.taker_order_id,
        created_at_ms: now_ms,
        executed_at_ms: None,
        completed_at_ms: None,
    };
    (deal, preimage)
}

/// Builds the deal the maker node keeps locally on receipt of a
/// `SwapRequest`.
pub fn build_maker_deal(
    pair_id: PairId,
    maker_order: &Order,
    r_hash: Hash32,
    quantity: u64,
    peer_pub_key: NodePubKey,
    taker_cltv_delta: u32,
    maker_order_id: crate::types::OrderId,
    taker_order_id: crate::types::OrderId,
    config: &SwapsConfig,
    now_ms: i64,
) -> SwapDeal {
    let legs = legs_for(&pair_id, maker_order, quantity);
    SwapDeal {
        r_hash,
        r_preimage: None,
        role: SwapRole::Maker,
        phase: SwapPhase::Created,
        state: SwapState::Active,
        pair_id,
        quantity,
        price: maker_order.price.unwrap_or(0.0),
        peer_pub_key,
        maker_currency: legs.maker_currency,
        taker_currency: legs.taker_currency,
        maker_units: legs.maker_units,
        taker_units: legs.taker_units,
        maker_cltv_delta: config.base_cltv_delta,
        taker_cltv_delta,
        maker_order_id,
        taker_order_id,
        created_at_ms: now_ms,
        executed_at_ms: None,
        completed_at_ms: None,
    }
}

pub fn order_is_own(order: &Order) -> bool {
    order.source.is_own()
}

pub fn to_record(deal: &SwapDeal, now_ms: i64) -> SwapDealRecord {
    SwapDealRecord {
        r_hash: hex::encode(deal.r_hash),
        r_preimage: deal.r_preimage.map(hex::encode),
        role: format!("{:?}", deal.role),
        phase: format!("{:?}", deal.phase),
        state: format!("{:?}", deal.state),
        quantity: deal.quantity as i64,
        price: Some(deal.price),
        pair_id: deal.pair_id.as_str().to_string(),
        peer_pub_key: deal.peer_pub_key.to_hex(),
        maker_order_id: Some(deal.maker_order_id.to_string()),
        taker_order_id: Some(deal.taker_order_id.to_string()),
        maker_currency: deal.maker_currency.clone(),
        taker_currency: deal.taker_currency.clone(),
        maker_units: deal.maker_units as i64,
        taker_units: deal.taker_units as i64,
        maker_cltv_delta: deal.maker_cltv_delta as i64,
        taker_cltv_delta: deal.taker_cltv_delta as i64,
        created_at_ms: deal.created_at_ms,
        updated_at_ms: now_ms,
    }
}

/// Rebuilds a live `SwapDeal` from its persisted row, for crash recovery
///. Fails closed (`None`) on any malformed hex/uuid field
/// rather than guessing — a corrupt row should surface, not silently drop.
pub fn from_record(record: &SwapDealRecord) -> Option<SwapDeal> {
    use secp256k1::PublicKey;
    use uuid::Uuid;

    use crate::types::OrderId;

    let r_hash = decode_hash32(&record.r_hash)?;
    let r_preimage = record.r_preimage.as_deref().map(decode_hash32).transpose()?;
    let role = match record.role.as_str() {
        "Maker" => SwapRole::Maker,
        "Taker" => SwapRole::Taker,
        _ => return None,
    };
    let phase = match record.phase.as_str() {
        "Created" => SwapPhase::Created,
        "SwapRequested" => SwapPhase::SwapRequested,
        "SwapAccepted" => SwapPhase::SwapAccepted,
        "SendingPayment" => SwapPhase::SendingPayment,
        "PaymentReceived" => SwapPhase::PaymentReceived,
        "SwapCompleted" => SwapPhase::SwapCompleted,
        _ => return None,
    };
    let state = match record.state.as_str() {
        "Active" => SwapState::Active,
        "Error" => SwapState::Error,
        "Recovered" => SwapState::Recovered,
        "Completed" => SwapState::Completed,
        _ => return None,
    };
    let peer_pub_key = hex::decode(&record.peer_pub_key)
        .ok()
        .and_then(|bytes| PublicKey::from_slice(&bytes).ok())
        .map(NodePubKey::from_public_key)?;
    let maker_order_id = OrderId(Uuid::parse_str(record.maker_order_id.as_deref()?).ok()?);
    let taker_order_id = OrderId(Uuid::parse_str(record.taker_order_id.as_deref()?).ok()?);

    Some(SwapDeal {
        r_hash,
        r_preimage,
        role,
        phase,
        state,
        pair_id: record.pair_id.as_str().into(),
        quantity: record.quantity as u64,
        price: record.price.unwrap_or(0.0),
        peer_pub_key,
        maker_currency: record.maker_currency.clone(),
        taker_currency: record.taker_currency.clone(),
        maker_units: record.maker_units as u64,
        taker_units: record.taker_units as u64,
        maker_cltv_delta: record.maker_cltv_delta as u32,
        taker_cltv_delta: record.taker_cltv_delta as u32,
        maker_order_id,
        taker_order_id,
        created_at_ms: record.created_at_ms,
        executed_at_ms: None,
        completed_at_ms: None,
    })
}

fn decode_hash32(s: &str) -> Option<Hash32> {
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocalId, OrderId};

    fn pub_key() -> NodePubKey {
        use secp256k1::{PublicKey, Secp256k1, SecretKey};
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[11u8; 32]).unwrap();
        NodePubKey::from_public_key(PublicKey::from_secret_key(&secp, &sk))
    }

    fn peer_order(pair: &PairId, quantity: i64, price: f64) -> Order {
        Order {
            id: OrderId::new(),
            pair_id: pair.clone(),
            quantity,
            price: Some(price),
            created_at_ms: 0,
            initial_quantity: quantity.unsigned_abs(),
            hold: 0,
            source: OrderSource::Peer {
                peer_pub_key: pub_key(),
                destination_hint: None,
            },
        }
    }

    fn own_order(pair: &PairId, quantity: i64) -> Order {
        Order {
            id: OrderId::new(),
            pair_id: pair.clone(),
            quantity,
            price: Some(2.0),
            created_at_ms: 0,
            initial_quantity: quantity.unsigned_abs(),
            hold: 0,
            source: OrderSource::Own {
                local_id: LocalId("l".into()),
                ttl_ms: None,
            },
        }
    }

    #[test]
    fn taker_deal_hashes_to_its_own_preimage() {
        let pair = PairId::new("BTC", "ETH");
        let maker = peer_order(&pair, -2, 2.0);
        let taker = own_order(&pair, 2);
        let matched = Match {
            maker_order_id: maker.id,
            taker_order_id: taker.id,
            maker,
            taker,
            quantity: 2,
        };
        let config = SwapsConfig::default();
        let (deal, preimage) = build_taker_deal(pair, &matched, pub_key(), &config, 1000);
        assert_eq!(hash_preimage(preimage), deal.r_hash);
        assert_eq!(deal.role, SwapRole::Taker);
        assert_eq!(deal.maker_currency, "BTC");
        assert_eq!(deal.taker_currency, "ETH");
        assert_eq!(deal.maker_units, 2);
        assert_eq!(deal.taker_units, 4);
    }

    #[test]
    fn maker_buy_side_sends_quote_currency() {
        let pair = PairId::new("BTC", "ETH");
        let maker = own_order(&pair, 3);
        let config = SwapsConfig::default();
        let deal = build_maker_deal(
            pair,
            &maker,
            [1u8; 32],
            3,
            pub_key(),
            200,
            OrderId::new(),
            OrderId::new(),
            &config,
            1000,
        );
        assert_eq!(deal.maker_currency, "ETH");
        assert_eq!(deal.taker_currency, "BTC");
        assert_eq!(deal.maker_units, 6);
        assert_eq!(deal.taker_units, 3);
    }
}
