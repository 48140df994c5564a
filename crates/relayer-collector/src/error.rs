use snafu::Snafu;

/// Scanner-level failures.
#[derive(Debug, Snafu)]
pub enum CollectorError {
    #[snafu(display("a negative startingBlock offset underflowed the current monitor block"))]
    BadConfigNegativeStartingBlock,

    #[snafu(display("monitor channel closed"))]
    MonitorClosed,

    #[snafu(display("store channel closed"))]
    StoreClosed { source: relayer_store::StoreError },

    #[snafu(display("rpc error: {}", source))]
    Rpc {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("resolver error: {}", source))]
    Resolver { source: relayer_resolver::ResolverError },

    #[snafu(display("wormholescan request failed: {}", source))]
    Wormholescan { source: reqwest::Error },
}

pub type Result<T, E = CollectorError> = std::result::Result<T, E>;

impl From<relayer_models::ModelError> for CollectorError {
    fn from(source: relayer_models::ModelError) -> Self {
        CollectorError::Rpc {
            source: Box::new(source),
        }
    }
}
