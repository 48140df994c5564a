use std::fmt;

use serde::{Deserialize, Serialize};

/// Decimal-string form of an EVM chain id, e.g. `"1"`, `"42161"`.
///
/// Kept as an opaque string rather than a numeric type because it is used purely
/// as a map key and configuration lookup key throughout the system; nothing here
/// does arithmetic on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The arbitrary messaging bridge that produced or will verify a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Amb {
    LayerZero,
    Wormhole,
}

impl fmt::Display for Amb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Amb::LayerZero => "layer-zero",
            Amb::Wormhole => "wormhole",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_from_u64_round_trips_through_display() {
        let id = ChainId::from(42161u64);
        assert_eq!(id.as_str(), "42161");
        assert_eq!(id.to_string(), "42161");
    }

    #[test]
    fn amb_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&Amb::LayerZero).unwrap(), "\"layer-zero\"");
        assert_eq!(serde_json::to_string(&Amb::Wormhole).unwrap(), "\"wormhole\"");
    }
}
