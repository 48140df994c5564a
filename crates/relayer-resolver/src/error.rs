use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum ResolverError {
    #[snafu(display("unknown resolver tag {tag:?}"))]
    UnknownTag { tag: String },

    #[snafu(display("invalid gas estimate: reported L1 portion exceeds the total"))]
    InvalidGasEstimate,

    #[snafu(display("rpc call failed: {source}"))]
    Rpc {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T, E = ResolverError> = std::result::Result<T, E>;
