use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::NodePubKey;

/// One frame on the wire: 4-byte length prefix + 1-byte type +
/// packet id + optional request id + body are handled by `PacketCodec`;
/// this struct is the decoded logical packet the codec produces/consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub body: PacketBody,
}

impl Packet {
    pub fn new(body: PacketBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id: None,
            body,
        }
    }

    pub fn in_response_to(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PacketBody {
    Hello(HelloBody),
    Disconnecting(DisconnectingBody),
    Ping,
    Pong,
    GetOrders { pair_id: String },
    Orders(Vec<WireOrder>),
    Order(WireOrder),
    OrderInvalidation(OrderInvalidationBody),
    SwapRequest(SwapRequestBody),
    SwapAccepted(SwapAcceptedBody),
    SwapFailed(SwapFailedBody),
    SwapComplete(SwapCompleteBody),
    NodeStateUpdate(NodeStateUpdateBody),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloBody {
    pub node_pub_key: NodePubKey,
    pub version: String,
    pub network_id: String,
    pub addresses: Vec<String>,
    pub pairs: Vec<String>,
}

/// Mirrors the design's disconnection reason codes exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectCode {
    Shutdown,
    NotAcceptingConnections,
    IncompatibleProtocolVersion,
    UnexpectedIdentity,
    AlreadyConnected,
    Banned,
    ConnectionTimeout,
    ResponseStalling,
    MalformedPacket,
    UnknownError,
}

impl DisconnectCode {
    /// the design: reconnect only for `Shutdown`, `AlreadyConnected`,
    /// `ConnectionTimeout` on an outbound connection.
    pub fn is_reconnect_worthy(&self) -> bool {
        matches!(
            self,
            DisconnectCode::Shutdown
                | DisconnectCode::AlreadyConnected
                | DisconnectCode::ConnectionTimeout
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectingBody {
    pub reason: DisconnectCode,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireOrder {
    pub pair_id: String,
    pub order_id: Uuid,
    pub quantity: i64,
    pub price: Option<f64>,
    pub created_at_ms: i64,
    pub destination_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInvalidationBody {
    pub pair_id: String,
    pub order_id: Uuid,
    /// `Some` decrements by this many absolute units, `None` removes fully.
    pub quantity: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequestBody {
    pub r_hash: [u8; 32],
    pub quantity: u64,
    pub pair_id: String,
    pub taker_cltv_delta: u32,
    pub taker_order_id: Uuid,
    pub maker_order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAcceptedBody {
    pub r_hash: [u8; 32],
    pub accepted_quantity: u64,
    pub maker_cltv_delta: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapFailedBody {
    pub r_hash: [u8; 32],
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapCompleteBody {
    pub r_hash: [u8; 32],
    /// Revealed once the settling side claims its incoming leg; the
    /// counterparty needs it to claim the other leg.
    pub r_preimage: [u8; 32],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStateUpdateBody {
    pub addresses: Vec<String>,
    pub pairs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_roundtrips_through_bincode() {
        let packet = Packet::new(PacketBody::Ping);
        let encoded = bincode::serialize(&packet).unwrap();
        let decoded: Packet = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.id, packet.id);
        assert!(matches!(decoded.body, PacketBody::Ping));
    }
}
