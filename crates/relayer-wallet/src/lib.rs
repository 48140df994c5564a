mod confirm;
mod error;
mod fee;
mod helper;
mod service;
mod submit;
mod worker;

pub use error::{NonceError, Result, WalletError};
pub use fee::{FeeData, FeePolicyConfig, BASIS_POINTS_BASE};
pub use helper::TransactionHelper;
pub use service::{WalletService, WalletServiceConfig};
pub use worker::{RoutedResult, WalletWorker, WalletWorkerConfig};
