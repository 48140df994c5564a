use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum MonitorError {
    #[snafu(display("monitor control channel closed"))]
    ChannelClosed,

    #[snafu(display("rpc call failed: {source}"))]
    Rpc {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
