use alloy::primitives::{Bytes, B256, U256};

use crate::error::{ModelError, Result};

/// The incentivized-message-escrow application payload shared by both AMBs
///.
///
/// Wire format: `destinationId(32) ∥ context(1) ∥ messageIdentifier(32) ∥
/// applicationPayload(rest)`. For Wormhole, `destinationId` is the numeric
/// Wormhole chain id of the destination; for LayerZero, the same escrow
/// contract emits the identical shape inside the packet's `message` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowPayload {
    pub destination_id: U256,
    pub context: u8,
    pub message_identifier: B256,
    pub application_payload: Bytes,
}

const HEADER_LEN: usize = 32 + 1 + 32;

/// Extract the escrow's `messageIdentifier` (and surrounding fields) from a raw
/// application payload.
pub fn parse_escrow_payload(payload: &[u8]) -> Result<EscrowPayload> {
    if payload.len() < HEADER_LEN {
        return Err(ModelError::PayloadTooShort { len: payload.len() });
    }
    let destination_id = U256::from_be_slice(&payload[0..32]);
    let context = payload[32];
    let message_identifier = B256::from_slice(&payload[33..65]);
    let application_payload = Bytes::copy_from_slice(&payload[65..]);

    Ok(EscrowPayload {
        destination_id,
        context,
        message_identifier,
        application_payload,
    })
}

/// Inverse of [`parse_escrow_payload`], used by tests to exercise round-trips.
pub fn encode_escrow_payload(payload: &EscrowPayload) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.application_payload.len());
    out.extend_from_slice(&payload.destination_id.to_be_bytes::<32>());
    out.push(payload.context);
    out.extend_from_slice(payload.message_identifier.as_slice());
    out.extend_from_slice(&payload.application_payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let original = EscrowPayload {
            destination_id: U256::from(23u64),
            context: 0,
            message_identifier: B256::repeat_byte(0x42),
            application_payload: Bytes::from_static(b"hello world"),
        };
        let encoded = encode_escrow_payload(&original);
        let decoded = parse_escrow_payload(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn rejects_payload_shorter_than_header() {
        let short = vec![0u8; HEADER_LEN - 1];
        let err = parse_escrow_payload(&short).unwrap_err();
        assert!(matches!(err, ModelError::PayloadTooShort { len } if len == HEADER_LEN - 1));
    }
}
