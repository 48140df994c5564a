use snafu::Snafu;

/// Decode and validation failures for entities in this crate.
#[derive(Debug, Snafu)]
pub enum ModelError {
    #[snafu(display("payload too short to contain a message identifier: {} bytes", len))]
    PayloadTooShort { len: usize },

    #[snafu(display("packet too short to decode a LayerZero header: {} bytes", len))]
    PacketTooShort { len: usize },

    #[snafu(display("unknown endpoint id {}", eid))]
    UnknownEndpointId { eid: u32 },
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
