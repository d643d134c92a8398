use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::PoolError;
use super::packet::Packet;

const LENGTH_PREFIX_BYTES: usize = 4;
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Length-prefixed framing over `bincode`: a 4-byte big-endian length
/// prefix followed by the body. `Packet` itself already carries the type tag (as the
/// `PacketBody` enum discriminant) and packet/request ids as struct fields,
/// so one `bincode`-encoded `Packet` is the frame body.
#[derive(Debug, Default)]
pub struct PacketCodec;

impl Encoder<Packet> for PacketCodec {
    type Error = PoolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = bincode::serialize(&packet)
            .map_err(|e| PoolError::MalformedPacket(e.to_string()))?;
        if body.len() > MAX_FRAME_BYTES as usize {
            return Err(PoolError::MalformedPacket(format!(
                "packet of {} bytes exceeds max frame size {}",
                body.len(),
                MAX_FRAME_BYTES
            )));
        }
        dst.reserve(LENGTH_PREFIX_BYTES + body.len());
        dst.put_u32(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = PoolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Self::Error> {
        if src.len() < LENGTH_PREFIX_BYTES {
            return Ok(None);
        }

        let len = u32::from_be_bytes(src[..LENGTH_PREFIX_BYTES].try_into().unwrap());
        if len > MAX_FRAME_BYTES {
            return Err(PoolError::MalformedPacket(format!(
                "advertised frame length {len} exceeds max {MAX_FRAME_BYTES}"
            )));
        }

        if src.len() < LENGTH_PREFIX_BYTES + len as usize {
            src.reserve(LENGTH_PREFIX_BYTES + len as usize - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_BYTES);
        let body = src.split_to(len as usize);
        let packet = bincode::deserialize(&body)
            .map_err(|e| PoolError::MalformedPacket(e.to_string()))?;
        Ok(Some(packet))
    }
}
