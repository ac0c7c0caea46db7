use serde::{Deserialize, Serialize};

/// Opaque resource-lock token scoping contention between tasks.
///
/// Convention: `"<subsystem>:<chainId>:<asset-class>"`. Two active tasks may
/// never hold overlapping locks; the constructors below cover the namespaces
/// the built-in actions contend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLock(String);

impl ResourceLock {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// A chain's vault buffer
    pub fn vault(chain_id: u64) -> Self {
        Self(format!("vault:{}:buffer", chain_id))
    }

    /// A chain's liquidity pool for one asset pair
    pub fn pool(chain_id: u64, pair: &str) -> Self {
        Self(format!("pool:{}:{}", chain_id, pair))
    }

    /// A chain's outbound bridge lane
    pub fn bridge(chain_id: u64) -> Self {
        Self(format!("bridge:{}:transfer", chain_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceLock {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_constructors_follow_convention() {
        assert_eq!(ResourceLock::vault(8453).as_str(), "vault:8453:buffer");
        assert_eq!(
            ResourceLock::pool(8453, "weth-usdc").as_str(),
            "pool:8453:weth-usdc"
        );
        assert_eq!(ResourceLock::bridge(10).as_str(), "bridge:10:transfer");
    }

    #[test]
    fn locks_compare_by_token() {
        assert_eq!(
            ResourceLock::new("vault:1:buffer"),
            ResourceLock::vault(1)
        );
        assert_ne!(ResourceLock::vault(1), ResourceLock::vault(2));
    }
}
