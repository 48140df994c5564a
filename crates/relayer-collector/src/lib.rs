mod common;
mod error;
mod layer_zero;
mod wormhole;

pub use common::ScannerConfig;
pub use error::{CollectorError, Result};
pub use layer_zero::{LayerZeroScanner, LayerZeroScannerConfig};
pub use wormhole::{
    WormholeRecoveryConfig, WormholeRecoveryWorker, WormholeScannerConfig, WormholeSourceScanner,
    WormholescanClient, WormholeTailWorker,
};
