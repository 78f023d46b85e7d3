//! Runtime configuration and the collection descriptor.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Process configuration: endpoints, gateways, timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    /// Path of the static collection descriptor (`config.json`).
    #[serde(default = "defaults::descriptor_path")]
    pub descriptor_path: String,

    /// Gateway base URLs in priority order. Each must end with `/`.
    #[serde(default = "defaults::ipfs_gateways")]
    pub ipfs_gateways: Vec<String>,

    #[serde(default = "defaults::fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// In-flight `ownerOf` reads during the exhaustive scan.
    #[serde(default = "defaults::scan_concurrency")]
    pub scan_concurrency: usize,

    /// Scans are refused when `totalMinted()` exceeds this.
    #[serde(default = "defaults::max_scan_tokens")]
    pub max_scan_tokens: u64,

    /// In-flight metadata fetches while building the gallery.
    #[serde(default = "defaults::metadata_concurrency")]
    pub metadata_concurrency: usize,

    #[serde(default = "defaults::feed_poll_ms")]
    pub feed_poll_ms: u64,

    /// Collection name used in fallback token names when `name()` is unavailable.
    #[serde(default = "defaults::default_collection_name")]
    pub default_collection_name: String,

    #[serde(default = "defaults::max_mint_per_tx")]
    pub max_mint_per_tx: u64,

    #[serde(default = "defaults::receipt_poll_ms")]
    pub receipt_poll_ms: u64,

    #[serde(default = "defaults::receipt_max_polls")]
    pub receipt_max_polls: u32,

    /// Account to act as instead of asking the node (`eth_accounts`).
    #[serde(default)]
    pub account: Option<Address>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            fallback_rpc_url: defaults::fallback_rpc_url(),
            descriptor_path: defaults::descriptor_path(),
            ipfs_gateways: defaults::ipfs_gateways(),
            fetch_timeout_ms: defaults::fetch_timeout_ms(),
            scan_concurrency: defaults::scan_concurrency(),
            max_scan_tokens: defaults::max_scan_tokens(),
            metadata_concurrency: defaults::metadata_concurrency(),
            feed_poll_ms: defaults::feed_poll_ms(),
            default_collection_name: defaults::default_collection_name(),
            max_mint_per_tx: defaults::max_mint_per_tx(),
            receipt_poll_ms: defaults::receipt_poll_ms(),
            receipt_max_polls: defaults::receipt_max_polls(),
            account: None,
        }
    }
}

impl Config {
    /// Layer `viewer.toml` (optional) and `VIEWER_*` env vars over defaults.
    ///
    /// A missing file falls back to defaults; malformed values are an error.
    pub fn load() -> Result<Self, crate::Error> {
        let built = config::Config::builder()
            .add_source(config::File::with_name("viewer").required(false))
            .add_source(
                config::Environment::with_prefix("VIEWER")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ipfs_gateways"),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Config>());

        let config = match built {
            Ok(c) => c,
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("not found") {
                    warn!(error = %e, "No config file found, using defaults");
                    Config::default()
                } else {
                    return Err(crate::Error::Config(err_str));
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ipfs_gateways.is_empty() {
            return Err(crate::Error::Config("at least one IPFS gateway is required".into()));
        }
        if let Some(bad) = self
            .ipfs_gateways
            .iter()
            .find(|g| !(g.starts_with("https://") || g.starts_with("http://")))
        {
            return Err(crate::Error::Config(format!("gateway is not an HTTP(S) URL: {bad}")));
        }
        if self.scan_concurrency == 0 {
            return Err(crate::Error::Config("scan_concurrency must be at least 1".into()));
        }
        if self.metadata_concurrency == 0 {
            return Err(crate::Error::Config("metadata_concurrency must be at least 1".into()));
        }
        if self.receipt_max_polls == 0 {
            return Err(crate::Error::Config("receipt_max_polls must be at least 1".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(crate::Error::Config("fetch_timeout_ms must be positive".into()));
        }
        if self.max_mint_per_tx == 0 {
            return Err(crate::Error::Config("max_mint_per_tx must be at least 1".into()));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn feed_poll_interval(&self) -> Duration {
        Duration::from_millis(self.feed_poll_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }
}

mod defaults {
    pub fn rpc_url() -> String {
        if let Ok(url) = std::env::var("PLASMA_RPC_URL") {
            if !url.is_empty() {
                return url;
            }
        }
        "https://rpc.plasma.to".into()
    }

    pub fn fallback_rpc_url() -> String {
        "https://plasma.drpc.org".into()
    }

    pub fn descriptor_path() -> String {
        "./config/config.json".into()
    }

    pub fn ipfs_gateways() -> Vec<String> {
        vec!["https://gateway.lighthouse.storage/ipfs/".into()]
    }

    pub fn fetch_timeout_ms() -> u64 {
        8_000
    }

    pub fn scan_concurrency() -> usize {
        10
    }

    pub fn max_scan_tokens() -> u64 {
        crate::ownership::DEFAULT_MAX_SCAN_TOKENS
    }

    pub fn metadata_concurrency() -> usize {
        crate::metadata::DEFAULT_METADATA_CONCURRENCY
    }

    pub fn receipt_poll_ms() -> u64 {
        2_000
    }

    pub fn receipt_max_polls() -> u32 {
        60
    }

    pub fn feed_poll_ms() -> u64 {
        4_000
    }

    pub fn default_collection_name() -> String {
        "Plasma Punks".into()
    }

    pub fn max_mint_per_tx() -> u64 {
        10
    }
}

// --- Collection descriptor ---

/// Network section of the descriptor.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct NetworkDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    pub id: u64,
}

/// Static JSON descriptor of the collection. Trusted, loaded once.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CollectionDescriptor {
    pub contract_address: Address,
    #[serde(default)]
    pub scan_link: String,
    pub network: NetworkDescriptor,
    #[serde(default)]
    pub nft_name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub max_supply: u64,
    /// Unit price in wei.
    #[serde(deserialize_with = "de_wei")]
    pub wei_cost: U256,
    #[serde(default)]
    pub display_cost: f64,
    /// Gas limit for a single-token mint.
    pub gas_limit: u64,
    #[serde(default)]
    pub marketplace: String,
    #[serde(default)]
    pub marketplace_link: String,
    #[serde(default)]
    pub show_background: bool,
}

impl CollectionDescriptor {
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::Config(format!("Invalid collection descriptor: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// `WEI_COST` arrives as a JSON number or a decimal/hex string.
fn de_wei<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => U256::from_str(s.trim()).map_err(D::Error::custom),
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| D::Error::custom(format!("WEI_COST must be an integer, got {n}"))),
        other => Err(D::Error::custom(format!("invalid WEI_COST: {other}"))),
    }
}
