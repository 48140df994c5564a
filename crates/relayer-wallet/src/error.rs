use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum NonceError {
    #[snafu(display("nonce expired"))]
    Expired,
    #[snafu(display("replacement transaction underpriced"))]
    ReplacementUnderpriced,
}

/// Errors raised inside a single wallet worker.
#[derive(Debug, Snafu)]
pub enum WalletError {
    #[snafu(display("deadline exceeded before submission"))]
    DeadlineExceeded,

    #[snafu(display("max tries reached"))]
    MaxTriesReached,

    #[snafu(display("transaction unconfirmed after max tries"))]
    Unconfirmed,

    #[snafu(display("wallet worker crashed"))]
    WalletCrashed,

    #[snafu(display("request channel closed"))]
    ChannelClosed,

    #[snafu(display("failed to enqueue request: buffer full or worker gone"))]
    EnqueueFailed,

    #[snafu(display("adjustment factor {name} = {value} out of range [1, 5]"))]
    AdjustmentFactorOutOfRange { name: &'static str, value: f64 },

    #[snafu(display("nonce error: {source}"))]
    Nonce { source: NonceError },

    #[snafu(display("rpc call failed: {source}"))]
    Rpc {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;
