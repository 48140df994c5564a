pub mod chain;
pub mod error;
pub mod message;
pub mod monitor;
pub mod payload;
pub mod tx;

pub use chain::*;
pub use error::*;
pub use message::*;
pub use monitor::*;
pub use payload::*;
pub use tx::*;
