use crate::core::errors::{HarnessError, Result};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Default location of the TOML configuration when neither `--config` nor
/// `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "bridge-e2e.toml";

/// Unified bridge deployment shared by the default chains.
const DEFAULT_BRIDGE_ADDRESS: &str = "0x2a3DD3EB832aF982ec71669E178424b10Dca2EDe";

/// One configured blockchain network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainDescriptor {
    /// Short key used by scenarios and CLI flags, e.g. "katana".
    pub key: String,
    pub name: String,
    pub chain_id: u64,
    /// Bridge-protocol network index. Not the chain id.
    pub network_id: u32,
    pub rpc_url: String,
    #[serde(default)]
    pub bridge_address: Option<Address>,
}

/// Token entry as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenConfig {
    pub symbol: String,
    pub chain: String,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default = "TokenConfig::default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub native: bool,
}

impl TokenConfig {
    fn default_decimals() -> u8 {
        18
    }
}

/// A planned test unit. Order in the list matters, see the scenario module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeScenario {
    pub from: String,
    pub to: String,
    pub token: String,
    /// Human readable amount, converted with the token's decimals.
    pub amount: String,
    #[serde(default)]
    pub label: String,
}

impl BridgeScenario {
    pub fn new(from: &str, to: &str, token: &str, amount: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            token: token.to_string(),
            amount: amount.to_string(),
            label: format!("{} {} -> {}", token, from, to),
        }
    }

    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!("{} {} -> {}", self.token, self.from, self.to)
        } else {
            self.label.clone()
        }
    }
}

/// Run tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessSettings {
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "HarnessSettings::default_router_api_url")]
    pub router_api_url: String,

    /// Delay between two scenarios (seconds).
    #[serde(default = "HarnessSettings::default_pacing_delay")]
    pub pacing_delay_secs: u64,

    /// Delay between the last transfer and claim processing (seconds).
    #[serde(default = "HarnessSettings::default_settlement_delay")]
    pub settlement_delay_secs: u64,

    #[serde(default = "HarnessSettings::default_gas_multiplier")]
    pub gas_multiplier: f64,

    /// Gas limit used when estimation fails.
    #[serde(default = "HarnessSettings::default_fallback_gas_limit")]
    pub fallback_gas_limit: u64,

    /// Slippage tolerance in percent.
    #[serde(default = "HarnessSettings::default_slippage")]
    pub slippage: f64,

    #[serde(default = "HarnessSettings::default_confirmations")]
    pub confirmations: usize,

    #[serde(default = "HarnessSettings::default_true")]
    pub force_update_global_exit_root: bool,

    /// Router provider / protocol tag whose transfers need a destination claim.
    #[serde(default = "HarnessSettings::default_claim_protocol")]
    pub claim_protocol: String,

    #[serde(default = "HarnessSettings::default_true")]
    pub validate_chains: bool,

    #[serde(default = "HarnessSettings::default_true")]
    pub process_existing_claims: bool,

    #[serde(default = "HarnessSettings::default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default = "HarnessSettings::default_deployments_dir")]
    pub deployments_dir: PathBuf,

    #[serde(default = "HarnessSettings::default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

impl HarnessSettings {
    fn default_router_api_url() -> String {
        "https://arc-api.polygon.technology".to_string()
    }
    fn default_pacing_delay() -> u64 { 3 }
    fn default_settlement_delay() -> u64 { 180 }
    fn default_gas_multiplier() -> f64 { 1.2 }
    fn default_fallback_gas_limit() -> u64 { 800_000 }
    fn default_slippage() -> f64 { 0.5 }
    fn default_confirmations() -> usize { 1 }
    fn default_true() -> bool { true }
    fn default_claim_protocol() -> String {
        "agglayer".to_string()
    }
    fn default_results_dir() -> PathBuf {
        PathBuf::from("results")
    }
    fn default_deployments_dir() -> PathBuf {
        PathBuf::from("deployments")
    }
    fn default_checkpoint_path() -> PathBuf {
        PathBuf::from("results/checkpoint.jsonl")
    }
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            router_api_url: Self::default_router_api_url(),
            pacing_delay_secs: Self::default_pacing_delay(),
            settlement_delay_secs: Self::default_settlement_delay(),
            gas_multiplier: Self::default_gas_multiplier(),
            fallback_gas_limit: Self::default_fallback_gas_limit(),
            slippage: Self::default_slippage(),
            confirmations: Self::default_confirmations(),
            force_update_global_exit_root: true,
            claim_protocol: Self::default_claim_protocol(),
            validate_chains: true,
            process_existing_claims: true,
            results_dir: Self::default_results_dir(),
            deployments_dir: Self::default_deployments_dir(),
            checkpoint_path: Self::default_checkpoint_path(),
        }
    }
}

/// Complete harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessConfig {
    #[serde(default)]
    pub settings: HarnessSettings,
    #[serde(default = "default_chains")]
    pub chains: Vec<ChainDescriptor>,
    #[serde(default = "default_tokens")]
    pub tokens: Vec<TokenConfig>,
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<BridgeScenario>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            settings: HarnessSettings::default(),
            chains: default_chains(),
            tokens: default_tokens(),
            scenarios: default_scenarios(),
        }
    }
}

impl HarnessConfig {
    /// Loads the configuration from `path` (or the default location), applies
    /// environment overrides and validates the result. A missing file yields
    /// the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(
                std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
            ),
        };

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            info!("Loaded configuration from {}", path.display());
            Self::from_toml_str(&content)?
        } else {
            debug!("No configuration file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `<CHAIN_KEY>_RPC_URL`, `ROUTER_API_URL` and `DRY_RUN` override file values.
    pub fn apply_env_overrides(&mut self) {
        for chain in &mut self.chains {
            let var = format!("{}_RPC_URL", chain.key.to_uppercase().replace('-', "_"));
            if let Ok(url) = std::env::var(&var) {
                if !url.trim().is_empty() {
                    debug!(chain = %chain.key, "RPC endpoint overridden by {}", var);
                    chain.rpc_url = url.trim().to_string();
                }
            }
        }
        if let Ok(url) = std::env::var("ROUTER_API_URL") {
            if !url.trim().is_empty() {
                self.settings.router_api_url = url.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("DRY_RUN") {
            let v = v.trim();
            if v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") {
                self.settings.dry_run = true;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(HarnessError::Config("no chains configured".to_string()));
        }
        let mut keys = HashSet::new();
        let mut chain_ids = HashSet::new();
        let mut network_ids = HashSet::new();
        for chain in &self.chains {
            if !keys.insert(chain.key.as_str()) {
                return Err(HarnessError::Config(format!("duplicate chain key {}", chain.key)));
            }
            if !chain_ids.insert(chain.chain_id) {
                return Err(HarnessError::Config(format!(
                    "duplicate chain id {} ({})",
                    chain.chain_id, chain.key
                )));
            }
            if !network_ids.insert(chain.network_id) {
                return Err(HarnessError::Config(format!(
                    "duplicate network id {} ({})",
                    chain.network_id, chain.key
                )));
            }
        }

        let mut token_keys = HashSet::new();
        for token in &self.tokens {
            if !keys.contains(token.chain.as_str()) {
                return Err(HarnessError::Config(format!(
                    "token {} references unknown chain {}",
                    token.symbol, token.chain
                )));
            }
            if !token_keys.insert((token.symbol.as_str(), token.chain.as_str())) {
                return Err(HarnessError::Config(format!(
                    "duplicate token {} on {}",
                    token.symbol, token.chain
                )));
            }
            if token.native && matches!(token.address, Some(a) if a != Address::zero()) {
                return Err(HarnessError::Config(format!(
                    "native token {} on {} must use the zero address",
                    token.symbol, token.chain
                )));
            }
        }

        for scenario in &self.scenarios {
            for chain in [&scenario.from, &scenario.to] {
                if !keys.contains(chain.as_str()) {
                    return Err(HarnessError::Config(format!(
                        "scenario '{}' references unknown chain {}",
                        scenario.display_label(),
                        chain
                    )));
                }
            }
            if scenario.from == scenario.to {
                return Err(HarnessError::Config(format!(
                    "scenario '{}' bridges to the same chain",
                    scenario.display_label()
                )));
            }
        }
        Ok(())
    }

    pub fn chain(&self, key: &str) -> Result<&ChainDescriptor> {
        self.chains
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| HarnessError::Config(format!("unknown chain {}", key)))
    }

    pub fn chain_by_network(&self, network_id: u32) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|c| c.network_id == network_id)
    }
}

/// Reads the signing key from `PRIVATE_KEY`.
pub fn wallet_private_key() -> Result<String> {
    let key = std::env::var("PRIVATE_KEY")
        .map_err(|_| HarnessError::Config("PRIVATE_KEY is not set".to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(HarnessError::Config("PRIVATE_KEY is empty".to_string()));
    }
    Ok(key.strip_prefix("0x").unwrap_or(key).to_string())
}

fn bridge_address() -> Option<Address> {
    Address::from_str(DEFAULT_BRIDGE_ADDRESS).ok()
}

fn default_chains() -> Vec<ChainDescriptor> {
    vec![
        ChainDescriptor {
            key: "ethereum".to_string(),
            name: "Ethereum".to_string(),
            chain_id: 1,
            network_id: 0,
            rpc_url: "https://eth.llamarpc.com".to_string(),
            bridge_address: bridge_address(),
        },
        ChainDescriptor {
            key: "polygon-zkevm".to_string(),
            name: "Polygon zkEVM".to_string(),
            chain_id: 1101,
            network_id: 1,
            rpc_url: "https://zkevm-rpc.com".to_string(),
            bridge_address: bridge_address(),
        },
        ChainDescriptor {
            key: "base".to_string(),
            name: "Base".to_string(),
            chain_id: 8453,
            network_id: 10,
            rpc_url: "https://mainnet.base.org".to_string(),
            bridge_address: bridge_address(),
        },
        ChainDescriptor {
            key: "katana".to_string(),
            name: "Katana".to_string(),
            chain_id: 747474,
            network_id: 20,
            rpc_url: "https://rpc.katana.network".to_string(),
            bridge_address: bridge_address(),
        },
    ]
}

fn token(symbol: &str, chain: &str, address: Option<&str>, decimals: u8, native: bool) -> TokenConfig {
    TokenConfig {
        symbol: symbol.to_string(),
        chain: chain.to_string(),
        address: address.and_then(|a| Address::from_str(a).ok()),
        decimals,
        native,
    }
}

/// Stand-in for the ASTEST origin contract on Katana. Replace it with the
/// address `deploy-token` writes to the deployments directory; ASTEST on
/// other chains stays unresolved until the first transfer out of Katana.
pub const ASTEST_KATANA_PLACEHOLDER: &str = "0x00000000000000000000000000000000a57e5700";

fn default_tokens() -> Vec<TokenConfig> {
    vec![
        token("ETH", "ethereum", None, 18, true),
        token("ETH", "polygon-zkevm", None, 18, true),
        token("ETH", "base", None, 18, true),
        token("ETH", "katana", None, 18, true),
        token("WBTC", "ethereum", Some("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"), 8, false),
        token("WBTC", "katana", None, 8, false),
        token("USDC", "ethereum", Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6, false),
        token("USDC", "base", Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"), 6, false),
        token("USDC", "katana", None, 6, false),
        token("ASTEST", "katana", Some(ASTEST_KATANA_PLACEHOLDER), 18, false),
        token("ASTEST", "base", None, 18, false),
    ]
}

/// Ordered so that a wrapped token is created on a chain before any scenario
/// bridges it out of that chain.
fn default_scenarios() -> Vec<BridgeScenario> {
    vec![
        BridgeScenario::new("base", "katana", "ETH", "0.0005"),
        BridgeScenario::new("katana", "base", "ETH", "0.0005"),
        BridgeScenario::new("ethereum", "katana", "ETH", "0.001"),
        BridgeScenario::new("ethereum", "katana", "WBTC", "0.00001"),
        BridgeScenario::new("katana", "ethereum", "WBTC", "0.00001"),
        BridgeScenario::new("base", "katana", "USDC", "1.0"),
        BridgeScenario::new("katana", "base", "USDC", "1.0"),
        BridgeScenario::new("katana", "base", "ASTEST", "10"),
        BridgeScenario::new("base", "katana", "ASTEST", "10"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chains.len(), 4);
        assert_eq!(config.settings.pacing_delay_secs, 3);
        assert_eq!(config.settings.settlement_delay_secs, 180);
        assert_eq!(config.settings.fallback_gas_limit, 800_000);
    }

    #[test]
    fn astest_originates_on_katana_only() {
        let config = HarnessConfig::default();
        let astest: Vec<_> = config.tokens.iter().filter(|t| t.symbol == "ASTEST").collect();
        let katana = astest.iter().find(|t| t.chain == "katana").unwrap();
        assert_eq!(katana.address, Address::from_str(ASTEST_KATANA_PLACEHOLDER).ok());
        assert!(astest.iter().filter(|t| t.chain != "katana").all(|t| t.address.is_none()));
    }

    #[test]
    fn duplicate_network_id_is_rejected() {
        let mut config = HarnessConfig::default();
        config.chains[1].network_id = config.chains[0].network_id;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate network id"));
    }

    #[test]
    fn native_token_with_address_is_rejected() {
        let mut config = HarnessConfig::default();
        config.tokens[0].address =
            Some(Address::from_str("0x1111111111111111111111111111111111111111").unwrap());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("zero address"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = HarnessConfig::from_toml_str(
            r#"
            [settings]
            dry_run = true
            pacing_delay_secs = 0
            "#,
        )
        .unwrap();
        assert!(config.settings.dry_run);
        assert_eq!(config.settings.pacing_delay_secs, 0);
        assert_eq!(config.settings.gas_multiplier, 1.2);
        assert_eq!(config.scenarios.len(), default_scenarios().len());
    }

    #[test]
    fn scenario_label_falls_back_to_route() {
        let scenario = BridgeScenario {
            from: "base".to_string(),
            to: "katana".to_string(),
            token: "ETH".to_string(),
            amount: "1".to_string(),
            label: String::new(),
        };
        assert_eq!(scenario.display_label(), "ETH base -> katana");
    }
}
