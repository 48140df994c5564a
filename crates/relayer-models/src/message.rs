use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::chain::{Amb, ChainId};

/// A cross-chain message in transit, as written to the store by a collector
/// scanner on source-event observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_identifier: B256,
    pub amb: Amb,
    pub from_chain_id: ChainId,
    pub to_chain_id: ChainId,
    pub from_incentives_address: Address,
    pub to_incentives_address: Address,
    pub incentives_payload: Bytes,
    /// Bridge-specific recovery context: the LayerZero GUID, or the Wormhole
    /// sequence number encoded as 8 big-endian bytes.
    pub recovery_context: Bytes,
    pub block_number: u64,
    pub block_hash: B256,
    pub transaction_hash: B256,
    /// May differ from `block_number` on L2s that expose both an L2 block and a
    /// reference L1 block; supplied by the resolver.
    pub transaction_block_number: u64,
}

/// A destination-chain-verifiable attestation that a `Message` was emitted
///.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub message_identifier: B256,
    pub amb: Amb,
    pub from_chain_id: ChainId,
    pub to_chain_id: ChainId,
    /// Wire-format bytes that the destination bridge contract accepts.
    pub message: Bytes,
    /// Opaque bridge-specific context; may be empty.
    pub message_ctx: Bytes,
}

/// LayerZero-only join record keyed by `keccak256(guid ∥ message)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHashIndexEntry {
    pub message_identifier: B256,
    pub destination_chain: ChainId,
    pub encoded_packet: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn message_round_trips_through_json() {
        let message = Message {
            message_identifier: B256::repeat_byte(0xAB),
            amb: Amb::LayerZero,
            from_chain_id: ChainId::from(1u64),
            to_chain_id: ChainId::from(42161u64),
            from_incentives_address: address!("0000000000000000000000000000000000000001"),
            to_incentives_address: address!("0000000000000000000000000000000000000002"),
            incentives_payload: Bytes::from_static(b"payload"),
            recovery_context: Bytes::from_static(b"guid"),
            block_number: 100,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: B256::repeat_byte(0x02),
            transaction_block_number: 99,
        };
        let json = serde_json::to_string(&message).unwrap();
        let round_tripped: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(message, round_tripped);
    }
}
