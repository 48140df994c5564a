pub mod alloy_ext;
pub mod background;

pub use alloy_ext::*;
pub use background::*;
