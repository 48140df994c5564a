mod error;
mod memory;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;

use alloy::primitives::B256;
use async_trait::async_trait;
use relayer_models::{ChainId, Message, PayloadHashIndexEntry, Proof};

/// The cross-process rendezvous between collector scanners and the wallet
/// service. No transactional guarantees span keys; each operation is
/// atomic at its own key.
///
/// The durable, multi-process-shared persister behind this trait is out of
/// scope here; [`InMemoryStore`] is the only implementation, chosen so a
/// durable one can be swapped in later without touching a caller.
#[async_trait]
pub trait Store: Send + Sync {
    async fn set_message(&self, chain_id: &ChainId, message: Message) -> Result<()>;

    async fn set_proof(&self, chain_id: &ChainId, proof: Proof) -> Result<()>;

    async fn set_payload_index(
        &self,
        payload_hash: B256,
        entry: PayloadHashIndexEntry,
    ) -> Result<()>;

    async fn get_by_payload_hash(
        &self,
        payload_hash: B256,
    ) -> Result<Option<PayloadHashIndexEntry>>;

    async fn get_message(&self, message_identifier: &B256) -> Result<Option<Message>>;

    async fn get_proof(&self, message_identifier: &B256) -> Result<Option<Proof>>;

    async fn quit(&self) -> Result<()>;
}
