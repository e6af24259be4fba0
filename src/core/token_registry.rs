//! Owner of the per-chain token address table.
//!
//! Non-native tokens start out unresolved on chains they have never been
//! bridged into. The wrapped address appears once the bridge mints it, and is
//! discovered through the router's token-mapping query.

use crate::blockchain::traits::Router;
use crate::core::config::{ChainDescriptor, TokenConfig};
use crate::core::errors::Result;
use ethers::types::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token metadata for one (symbol, chain) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub chain: String,
    /// Zero for native tokens, `None` while a wrapped token is unknown.
    pub address: Option<Address>,
    pub decimals: u8,
    pub is_native: bool,
}

impl TokenDescriptor {
    /// Address usable as a transfer origin, if any.
    pub fn source_address(&self) -> Option<Address> {
        if self.is_native {
            Some(Address::zero())
        } else {
            self.address
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.source_address().is_some()
    }
}

impl From<&TokenConfig> for TokenDescriptor {
    fn from(cfg: &TokenConfig) -> Self {
        Self {
            symbol: cfg.symbol.clone(),
            chain: cfg.chain.clone(),
            address: if cfg.native { Some(Address::zero()) } else { cfg.address },
            decimals: cfg.decimals,
            is_native: cfg.native,
        }
    }
}

/// Shared handle to the token table. Cloning is cheap and every clone sees
/// the same entries.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    inner: Arc<RwLock<HashMap<(String, String), TokenDescriptor>>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(tokens: &[TokenConfig]) -> Self {
        let registry = Self::new();
        for token in tokens {
            registry.insert(TokenDescriptor::from(token));
        }
        registry
    }

    pub fn insert(&self, descriptor: TokenDescriptor) {
        let key = (descriptor.symbol.to_uppercase(), descriptor.chain.clone());
        self.inner.write().insert(key, descriptor);
    }

    pub fn descriptor(&self, symbol: &str, chain: &str) -> Option<TokenDescriptor> {
        self.inner.read().get(&(symbol.to_uppercase(), chain.to_string())).cloned()
    }

    /// Address of `symbol` on `chain`; zero for native tokens.
    pub fn resolve(&self, symbol: &str, chain: &str) -> Option<Address> {
        self.descriptor(symbol, chain).and_then(|d| d.source_address())
    }

    /// Fills in a discovered address. Native entries are never overwritten.
    pub fn record(&self, symbol: &str, chain: &str, address: Address) -> bool {
        let mut table = self.inner.write();
        match table.get_mut(&(symbol.to_uppercase(), chain.to_string())) {
            Some(d) if d.is_native => false,
            Some(d) => {
                if d.address != Some(address) {
                    info!(symbol, chain, address = ?address, "Recorded token address");
                    d.address = Some(address);
                }
                true
            }
            None => false,
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> =
            self.inner.read().keys().map(|(symbol, _)| symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    pub fn descriptors_for(&self, symbol: &str) -> Vec<TokenDescriptor> {
        let symbol = symbol.to_uppercase();
        let mut out: Vec<TokenDescriptor> =
            self.inner.read().values().filter(|d| d.symbol.to_uppercase() == symbol).cloned().collect();
        out.sort_by(|a, b| a.chain.cmp(&b.chain));
        out
    }

    /// Resolves wrapped addresses of `symbol` on every chain where it is still
    /// unknown, using the first chain that has a concrete contract address as
    /// the origin. Returns how many entries were filled in.
    pub async fn refresh_wrapped(
        &self,
        router: &dyn Router,
        chains: &[ChainDescriptor],
        symbol: &str,
    ) -> Result<usize> {
        let descriptors = self.descriptors_for(symbol);
        let unresolved: Vec<&TokenDescriptor> =
            descriptors.iter().filter(|d| !d.is_resolved()).collect();
        if unresolved.is_empty() {
            return Ok(0);
        }
        let Some(origin) = descriptors.iter().find_map(|d| match (d.is_native, d.address) {
            (false, Some(addr)) => Some(addr),
            _ => None,
        }) else {
            debug!(symbol, "No origin address known, cannot resolve wrapped tokens");
            return Ok(0);
        };

        let mappings = router.get_token_mappings(origin).await?;
        let mut filled = 0;
        for descriptor in unresolved {
            let Some(chain) = chains.iter().find(|c| c.key == descriptor.chain) else {
                continue;
            };
            let found = mappings.iter().find(|m| {
                m.wrapped_token_network == chain.network_id && m.wrapped_token_address != Address::zero()
            });
            if let Some(mapping) = found {
                if self.record(symbol, &descriptor.chain, mapping.wrapped_token_address) {
                    filled += 1;
                }
            }
        }
        if filled == 0 {
            warn!(symbol, "Token mappings did not resolve any wrapped address");
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn registry() -> TokenRegistry {
        let registry = TokenRegistry::new();
        registry.insert(TokenDescriptor {
            symbol: "ETH".into(),
            chain: "base".into(),
            address: Some(Address::zero()),
            decimals: 18,
            is_native: true,
        });
        registry.insert(TokenDescriptor {
            symbol: "WBTC".into(),
            chain: "katana".into(),
            address: None,
            decimals: 8,
            is_native: false,
        });
        registry
    }

    #[test]
    fn native_resolves_to_zero() {
        assert_eq!(registry().resolve("eth", "base"), Some(Address::zero()));
    }

    #[test]
    fn unresolved_until_recorded() {
        let registry = registry();
        assert_eq!(registry.resolve("WBTC", "katana"), None);
        let wrapped = addr("0x0913da6da4b42f538b445599b46bb4622342cf52");
        assert!(registry.record("WBTC", "katana", wrapped));
        assert_eq!(registry.resolve("WBTC", "katana"), Some(wrapped));
    }

    #[test]
    fn record_never_touches_native_entries() {
        let registry = registry();
        assert!(!registry.record("ETH", "base", addr("0x1111111111111111111111111111111111111111")));
        assert_eq!(registry.resolve("ETH", "base"), Some(Address::zero()));
    }

    #[test]
    fn clones_share_state() {
        let registry = registry();
        let other = registry.clone();
        let wrapped = addr("0x2222222222222222222222222222222222222222");
        other.record("WBTC", "katana", wrapped);
        assert_eq!(registry.resolve("WBTC", "katana"), Some(wrapped));
    }
}
