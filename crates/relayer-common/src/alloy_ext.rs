use std::str::FromStr;

use alloy::{
    network::EthereumWallet,
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, ProviderBuilder, RootProvider, WsConnect,
    },
    pubsub::{ConnectionHandle, PubSubConnect},
    rpc::client::ClientBuilder,
    signers::local::LocalSigner,
    transports::{impl_future, TransportResult},
};
use backoff::exponential::ExponentialBackoff;
use snafu::Snafu;

/// A websocket transport that retries reconnection with exponential backoff
/// instead of giving up after the first drop.
#[derive(Clone, Debug)]
pub struct RetryWsConnect(WsConnect);

impl RetryWsConnect {
    pub fn new(url: &str) -> Self {
        Self(WsConnect::new(url))
    }
}

impl PubSubConnect for RetryWsConnect {
    fn is_local(&self) -> bool {
        self.0.is_local()
    }

    fn connect(&self) -> impl_future!(<Output = TransportResult<ConnectionHandle>>) {
        self.0.connect()
    }

    async fn try_reconnect(&self) -> TransportResult<ConnectionHandle> {
        backoff::future::retry(
            ExponentialBackoff::<backoff::SystemClock>::default(),
            || async { Ok(self.0.try_reconnect().await?) },
        )
        .await
    }
}

pub type WebsocketWalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

/// Read-only counterpart used by collector scanners, which never sign
/// transactions.
pub type WebsocketProvider = FillProvider<
    JoinFill<Identity, JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>>,
    RootProvider,
>;

#[derive(Debug, Snafu)]
pub enum ProviderError {
    #[snafu(display("failed to create websocket client: {source}"))]
    Client {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("failed to construct local signer: {source}"))]
    LocalSigner {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<alloy::transports::RpcError<alloy::transports::TransportErrorKind>> for ProviderError {
    fn from(error: alloy::transports::RpcError<alloy::transports::TransportErrorKind>) -> Self {
        ProviderError::Client {
            source: Box::new(error),
        }
    }
}

impl From<alloy::signers::local::LocalSignerError> for ProviderError {
    fn from(error: alloy::signers::local::LocalSignerError) -> Self {
        ProviderError::LocalSigner {
            source: Box::new(error),
        }
    }
}

/// Builds a provider that both signs and submits transactions over a
/// reconnecting websocket. Not type-erased so callers retain access to the
/// wallet-specific provider methods (nonce filler, chain id filler, ...).
pub async fn create_websocket_wallet_provider(
    evm_rpc_websocket_url: &str,
    private_key: [u8; 32],
) -> Result<WebsocketWalletProvider, ProviderError> {
    let ws = RetryWsConnect::new(evm_rpc_websocket_url);
    let client = ClientBuilder::default().pubsub(ws).await?;

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::new(LocalSigner::from_str(
            &alloy::hex::encode(private_key),
        )?))
        .connect_client(client);

    Ok(provider)
}

/// Builds a read-only provider over a reconnecting websocket, for monitors
/// and scanners that only ever call view functions and subscribe to logs.
pub async fn create_websocket_provider(
    evm_rpc_websocket_url: &str,
) -> Result<WebsocketProvider, ProviderError> {
    let ws = RetryWsConnect::new(evm_rpc_websocket_url);
    let client = ClientBuilder::default().pubsub(ws).await?;
    Ok(ProviderBuilder::new().connect_client(client))
}
