use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::Filter;
use alloy::sol;
use alloy::sol_types::SolEvent;
use tokio::sync::watch;
use tracing::{info, warn};

use relayer_models::{
    parse_escrow_payload, Amb, ChainId, Message, MonitorStatus, PayloadHashIndexEntry, Proof,
};
use relayer_resolver::Resolver;
use relayer_store::Store;

use crate::common::{run_scanner_loop, ScannerConfig};
use crate::error::{CollectorError, Result};

sol! {
    #[derive(Debug)]
    event PacketSent(bytes encodedPacket, bytes options, address sendLibrary);

    #[derive(Debug)]
    event PayloadVerified(address dvn, bytes header, uint64 confirmations, bytes32 proofHash);

    #[sol(rpc)]
    interface IReceiveLibrary {
        function getUlnConfig(address dvn, uint32 dstEid)
            external
            view
            returns (uint64 confirmations, uint8 requiredDVNCount, uint8 optionalDVNCount, uint8 optionalDVNThreshold);

        function verifiable(bytes calldata config, bytes32 headerHash, bytes32 proofHash)
            external
            view
            returns (bool);
    }
}

/// A decoded LayerZero packet or header prefix.
struct PacketHeader {
    #[allow(dead_code)]
    nonce: u64,
    src_eid: u32,
    sender: Address,
    dst_eid: u32,
    receiver: Address,
}

const HEADER_LEN: usize = 81; // version(1) + nonce(8) + srcEid(4) + sender(32) + dstEid(4) + receiver(32)
const PACKET_PREFIX_LEN: usize = HEADER_LEN + 32; // + guid(32)

fn decode_header(bytes: &[u8]) -> Result<PacketHeader, relayer_models::ModelError> {
    if bytes.len() < HEADER_LEN {
        return Err(relayer_models::ModelError::PacketTooShort { len: bytes.len() });
    }
    Ok(PacketHeader {
        nonce: u64::from_be_bytes(bytes[1..9].try_into().unwrap()),
        src_eid: u32::from_be_bytes(bytes[9..13].try_into().unwrap()),
        sender: Address::from_slice(&bytes[25..45]),
        dst_eid: u32::from_be_bytes(bytes[45..49].try_into().unwrap()),
        receiver: Address::from_slice(&bytes[61..81]),
    })
}

fn decode_packet(bytes: &[u8]) -> Result<(PacketHeader, B256, Bytes), relayer_models::ModelError> {
    if bytes.len() < PACKET_PREFIX_LEN {
        return Err(relayer_models::ModelError::PacketTooShort { len: bytes.len() });
    }
    let header = decode_header(bytes)?;
    let guid = B256::from_slice(&bytes[HEADER_LEN..PACKET_PREFIX_LEN]);
    let message = Bytes::copy_from_slice(&bytes[PACKET_PREFIX_LEN..]);
    Ok((header, guid, message))
}

/// Packs the ULN config's numeric fields as a fixed-width blob before it is
/// passed to `verifiable`: 8 bytes of confirmations followed
/// by the three one-byte DVN counts.
fn pack_uln_config(confirmations: u64, required: u8, optional: u8, threshold: u8) -> Bytes {
    let mut buf = Vec::with_capacity(11);
    buf.extend_from_slice(&confirmations.to_be_bytes());
    buf.push(required);
    buf.push(optional);
    buf.push(threshold);
    Bytes::from(buf)
}

/// Per-chain LayerZero bridge wiring.
#[derive(Clone)]
pub struct LayerZeroScannerConfig {
    pub chain_id: ChainId,
    pub endpoint_address: Address,
    pub receive_library_address: Address,
    pub eid_to_chain_id: HashMap<u32, ChainId>,
    pub incentives_address: HashMap<ChainId, Address>,
    pub scanner: ScannerConfig,
}

/// Watches a single chain's LayerZero endpoint and receive-library for
/// `PacketSent` and `PayloadVerified` events.
pub struct LayerZeroScanner {
    provider: DynProvider,
    resolver: Arc<dyn Resolver>,
    store: Arc<dyn Store>,
    config: LayerZeroScannerConfig,
}

impl LayerZeroScanner {
    pub fn new(
        provider: DynProvider,
        resolver: Arc<dyn Resolver>,
        store: Arc<dyn Store>,
        config: LayerZeroScannerConfig,
    ) -> Self {
        Self {
            provider,
            resolver,
            store,
            config,
        }
    }

    pub async fn run(mut self, monitor_status: watch::Receiver<MonitorStatus>) -> Result<()> {
        let scanner_config = self.config.scanner;
        run_scanner_loop(monitor_status, scanner_config, |from_block, to_block| {
            self.process_window(from_block, to_block)
        })
        .await
    }

    async fn process_window(&mut self, from_block: u64, to_block: u64) -> Result<()> {
        let packet_filter = Filter::new()
            .address(self.config.endpoint_address)
            .from_block(from_block)
            .to_block(to_block);
        let verified_filter = Filter::new()
            .address(self.config.receive_library_address)
            .from_block(from_block)
            .to_block(to_block);

        let (packets, verifications) =
            tokio::join!(self.provider.get_logs(&packet_filter), self.provider.get_logs(&verified_filter));

        match packets {
            Ok(logs) => {
                for log in logs {
                    if let Ok(decoded) = PacketSent::decode_log(&log.inner, true) {
                        if let Err(e) = self.handle_packet_sent(&log, &decoded.data).await {
                            warn!(error = %e, "failed to process PacketSent log");
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "PacketSent log window failed, treating as empty"),
        }

        match verifications {
            Ok(logs) => {
                for log in logs {
                    if let Ok(decoded) = PayloadVerified::decode_log(&log.inner, true) {
                        if let Err(e) = self.handle_payload_verified(&decoded.data).await {
                            warn!(error = %e, "failed to process PayloadVerified log");
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "PayloadVerified log window failed, treating as empty"),
        }

        Ok(())
    }

    async fn handle_packet_sent(
        &self,
        log: &alloy::rpc::types::Log,
        event: &PacketSent,
    ) -> Result<()> {
        let (header, guid, message) = decode_packet(&event.encodedPacket)?;

        let Some(from_chain) = self.config.eid_to_chain_id.get(&header.src_eid).cloned() else {
            info!(eid = header.src_eid, "unknown srcEid, skipping PacketSent");
            return Ok(());
        };
        let Some(to_chain) = self.config.eid_to_chain_id.get(&header.dst_eid).cloned() else {
            info!(eid = header.dst_eid, "unknown dstEid, skipping PacketSent");
            return Ok(());
        };

        let Some(expected_sender) = self.config.incentives_address.get(&from_chain) else {
            return Ok(());
        };
        if header.sender != *expected_sender {
            return Ok(());
        }

        let payload = parse_escrow_payload(&message)?;
        let payload_hash = keccak256([guid.as_slice(), message.as_ref()].concat());
        let block_number = log.block_number.unwrap_or_default();
        let transaction_block_number = self
            .resolver
            .transaction_block_number(block_number)
            .await
            .map_err(|source| CollectorError::Resolver { source })?;

        let message_record = Message {
            message_identifier: payload.message_identifier,
            amb: Amb::LayerZero,
            from_chain_id: from_chain,
            to_chain_id: to_chain,
            from_incentives_address: header.sender,
            to_incentives_address: header.receiver,
            incentives_payload: payload.application_payload,
            recovery_context: Bytes::copy_from_slice(guid.as_slice()),
            block_number,
            block_hash: log.block_hash.unwrap_or_default(),
            transaction_hash: log.transaction_hash.unwrap_or_default(),
            transaction_block_number,
        };
        let set_chain = message_record.from_chain_id.clone();
        self.store
            .set_message(&set_chain, message_record)
            .await
            .map_err(|source| CollectorError::StoreClosed { source })?;

        self.store
            .set_payload_index(
                payload_hash,
                PayloadHashIndexEntry {
                    message_identifier: payload.message_identifier,
                    destination_chain: to_chain,
                    encoded_packet: event.encodedPacket.clone(),
                },
            )
            .await
            .map_err(|source| CollectorError::StoreClosed { source })?;

        Ok(())
    }

    async fn handle_payload_verified(&self, event: &PayloadVerified) -> Result<()> {
        let header = decode_header(&event.header)?;

        let Some(from_chain) = self.config.eid_to_chain_id.get(&header.src_eid).cloned() else {
            return Ok(());
        };
        let Some(to_chain) = self.config.eid_to_chain_id.get(&header.dst_eid).cloned() else {
            return Ok(());
        };

        let Some(expected_sender) = self.config.incentives_address.get(&from_chain) else {
            return Ok(());
        };
        if header.sender != *expected_sender {
            return Ok(());
        }

        let Some(entry) = self
            .store
            .get_by_payload_hash(event.proofHash)
            .await
            .map_err(|source| CollectorError::StoreClosed { source })?
        else {
            info!(proof_hash = %event.proofHash, "no matching PacketSent observed yet, skipping");
            return Ok(());
        };

        let receive_library = IReceiveLibrary::new(self.config.receive_library_address, self.provider.clone());
        let uln_config = receive_library
            .getUlnConfig(event.dvn, header.dst_eid)
            .call()
            .await
            .map_err(|e| CollectorError::Rpc { source: Box::new(e) })?;
        let packed_config = pack_uln_config(
            uln_config.confirmations,
            uln_config.requiredDVNCount,
            uln_config.optionalDVNCount,
            uln_config.optionalDVNThreshold,
        );

        let header_hash = keccak256(&event.header);
        let verifiable = receive_library
            .verifiable(packed_config, header_hash, event.proofHash)
            .call()
            .await
            .map_err(|e| CollectorError::Rpc { source: Box::new(e) })?;

        if !verifiable {
            return Ok(());
        }

        let proof = Proof {
            message_identifier: entry.message_identifier,
            amb: Amb::LayerZero,
            from_chain_id: from_chain,
            to_chain_id: to_chain,
            message: entry.encoded_packet,
            message_ctx: Bytes::new(),
        };
        self.store
            .set_proof(&to_chain, proof)
            .await
            .map_err(|source| CollectorError::StoreClosed { source })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_header_rejects_short_input() {
        assert!(decode_header(&[0u8; 10]).is_err());
    }

    #[test]
    fn decode_packet_round_trips_header_fields() {
        let mut bytes = vec![0u8; PACKET_PREFIX_LEN + 4];
        bytes[1..9].copy_from_slice(&42u64.to_be_bytes());
        bytes[9..13].copy_from_slice(&30101u32.to_be_bytes());
        bytes[25..45].copy_from_slice(Address::repeat_byte(0xAB).as_slice());
        bytes[45..49].copy_from_slice(&30110u32.to_be_bytes());
        bytes[61..81].copy_from_slice(Address::repeat_byte(0xCD).as_slice());
        bytes[HEADER_LEN..PACKET_PREFIX_LEN].copy_from_slice(&[0x11; 32]);
        bytes[PACKET_PREFIX_LEN..].copy_from_slice(&[0xFF; 4]);

        let (header, guid, message) = decode_packet(&bytes).unwrap();
        assert_eq!(header.nonce, 42);
        assert_eq!(header.src_eid, 30101);
        assert_eq!(header.sender, Address::repeat_byte(0xAB));
        assert_eq!(header.dst_eid, 30110);
        assert_eq!(header.receiver, Address::repeat_byte(0xCD));
        assert_eq!(guid, B256::repeat_byte(0x11));
        assert_eq!(message.as_ref(), &[0xFF; 4]);
    }
}
