use alloy::primitives::B256;
use async_trait::async_trait;
use dashmap::DashMap;
use relayer_models::{ChainId, Message, PayloadHashIndexEntry, Proof};

use crate::{Result, Store};

/// In-process concurrent map backing the [`Store`] trait. Keys are
/// scoped per chain for messages/proofs since `messageIdentifier` is globally
/// unique but a chain tag is still useful for debugging and metrics.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    messages: DashMap<B256, (ChainId, Message)>,
    proofs: DashMap<B256, (ChainId, Proof)>,
    payload_index: DashMap<B256, PayloadHashIndexEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn set_message(&self, chain_id: &ChainId, message: Message) -> Result<()> {
        self.messages
            .insert(message.message_identifier, (chain_id.clone(), message));
        Ok(())
    }

    async fn set_proof(&self, chain_id: &ChainId, proof: Proof) -> Result<()> {
        self.proofs
            .insert(proof.message_identifier, (chain_id.clone(), proof));
        Ok(())
    }

    async fn set_payload_index(
        &self,
        payload_hash: B256,
        entry: PayloadHashIndexEntry,
    ) -> Result<()> {
        self.payload_index.insert(payload_hash, entry);
        Ok(())
    }

    async fn get_by_payload_hash(
        &self,
        payload_hash: B256,
    ) -> Result<Option<PayloadHashIndexEntry>> {
        Ok(self
            .payload_index
            .get(&payload_hash)
            .map(|entry| entry.value().clone()))
    }

    async fn get_message(&self, message_identifier: &B256) -> Result<Option<Message>> {
        Ok(self
            .messages
            .get(message_identifier)
            .map(|entry| entry.value().1.clone()))
    }

    async fn get_proof(&self, message_identifier: &B256) -> Result<Option<Proof>> {
        Ok(self
            .proofs
            .get(message_identifier)
            .map(|entry| entry.value().1.clone()))
    }

    async fn quit(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use relayer_models::Amb;

    fn sample_message(id: B256) -> Message {
        Message {
            message_identifier: id,
            amb: Amb::LayerZero,
            from_chain_id: ChainId::from(1u64),
            to_chain_id: ChainId::from(42161u64),
            from_incentives_address: address!("0000000000000000000000000000000000000001"),
            to_incentives_address: address!("0000000000000000000000000000000000000002"),
            incentives_payload: alloy::primitives::Bytes::from_static(b"payload"),
            recovery_context: alloy::primitives::Bytes::from_static(b"guid"),
            block_number: 1,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: B256::repeat_byte(0x02),
            transaction_block_number: 1,
        }
    }

    #[tokio::test]
    async fn set_message_is_idempotent_on_identical_rewrite() {
        let store = InMemoryStore::new();
        let id = B256::repeat_byte(0xAA);
        let chain = ChainId::from(1u64);
        store.set_message(&chain, sample_message(id)).await.unwrap();
        store.set_message(&chain, sample_message(id)).await.unwrap();

        let fetched = store.get_message(&id).await.unwrap().unwrap();
        assert_eq!(fetched, sample_message(id));
    }

    #[tokio::test]
    async fn proof_may_exist_without_a_matching_message() {
        let store = InMemoryStore::new();
        let id = B256::repeat_byte(0xBB);
        assert!(store.get_message(&id).await.unwrap().is_none());

        let proof = Proof {
            message_identifier: id,
            amb: Amb::Wormhole,
            from_chain_id: ChainId::from(1u64),
            to_chain_id: ChainId::from(10u64),
            message: alloy::primitives::Bytes::from_static(b"vaa"),
            message_ctx: alloy::primitives::Bytes::new(),
        };
        store.set_proof(&ChainId::from(1u64), proof.clone()).await.unwrap();

        assert_eq!(store.get_proof(&id).await.unwrap(), Some(proof));
        assert!(store.get_message(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn payload_index_round_trips_by_hash() {
        let store = InMemoryStore::new();
        let hash = B256::repeat_byte(0xCC);
        let entry = PayloadHashIndexEntry {
            message_identifier: B256::repeat_byte(0xDD),
            destination_chain: ChainId::from(8453u64),
            encoded_packet: alloy::primitives::Bytes::from_static(b"packet"),
        };
        assert!(store.get_by_payload_hash(hash).await.unwrap().is_none());
        store.set_payload_index(hash, entry.clone()).await.unwrap();
        assert_eq!(store.get_by_payload_hash(hash).await.unwrap(), Some(entry));
    }
}
