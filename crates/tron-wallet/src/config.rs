use crate::errors::WalletError;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};

pub const MAINNET_RPC_URL: &str = "https://api.trongrid.io";
pub const SHASTA_RPC_URL: &str = "https://api.shasta.trongrid.io";
pub const NILE_RPC_URL: &str = "https://nile.trongrid.io";

pub const MAINNET_USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const SHASTA_USDT_CONTRACT: &str = "TG3XXyExBkPp9nzdajDZsozEu4BkaSJozs";

pub const DEFAULT_WALLET_DIR: &str = "./wallets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Shasta,
    Nile,
}

impl Network {
    pub const ALL: [Self; 3] = [Self::Mainnet, Self::Shasta, Self::Nile];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Shasta => "shasta",
            Self::Nile => "nile",
        }
    }

    /// Environment variable holding this network's USDT contract address.
    pub const fn usdt_contract_env(self) -> &'static str {
        match self {
            Self::Mainnet => "MAINNET_USDT_CONTRACT",
            Self::Shasta => "SHASTA_USDT_CONTRACT",
            Self::Nile => "NILE_USDT_CONTRACT",
        }
    }

    pub const fn rpc_url_env(self) -> &'static str {
        match self {
            Self::Mainnet => "MAINNET_RPC_URL",
            Self::Shasta => "SHASTA_RPC_URL",
            Self::Nile => "NILE_RPC_URL",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the gateway needs to talk to one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub endpoint: String,
    pub explorer_base: String,
    pub faucet_url: Option<String>,
    /// Empty when not configured.
    pub usdt_contract: String,
}

impl NetworkProfile {
    pub fn default_for(network: Network) -> Self {
        match network {
            Network::Mainnet => Self {
                endpoint: MAINNET_RPC_URL.into(),
                explorer_base: "https://tronscan.org".into(),
                faucet_url: None,
                usdt_contract: MAINNET_USDT_CONTRACT.into(),
            },
            Network::Shasta => Self {
                endpoint: SHASTA_RPC_URL.into(),
                explorer_base: "https://shasta.tronscan.org".into(),
                faucet_url: Some("https://www.trongrid.io/shasta".into()),
                usdt_contract: SHASTA_USDT_CONTRACT.into(),
            },
            Network::Nile => Self {
                endpoint: NILE_RPC_URL.into(),
                explorer_base: "https://nile.tronscan.org".into(),
                faucet_url: Some("https://nileex.io/join/getJoinPage".into()),
                usdt_contract: String::new(),
            },
        }
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/#/address/{address}", self.explorer_base)
    }

    pub fn transaction_url(&self, txid: &str) -> String {
        format!("{}/#/transaction/{txid}", self.explorer_base)
    }
}

/// Immutable `Network -> NetworkProfile` mapping, passed explicitly to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTable {
    mainnet: NetworkProfile,
    shasta: NetworkProfile,
    nile: NetworkProfile,
}

impl Default for NetworkTable {
    fn default() -> Self {
        Self {
            mainnet: NetworkProfile::default_for(Network::Mainnet),
            shasta: NetworkProfile::default_for(Network::Shasta),
            nile: NetworkProfile::default_for(Network::Nile),
        }
    }
}

impl NetworkTable {
    pub const fn profile(&self, network: Network) -> &NetworkProfile {
        match network {
            Network::Mainnet => &self.mainnet,
            Network::Shasta => &self.shasta,
            Network::Nile => &self.nile,
        }
    }

    fn profile_mut(&mut self, network: Network) -> &mut NetworkProfile {
        match network {
            Network::Mainnet => &mut self.mainnet,
            Network::Shasta => &mut self.shasta,
            Network::Nile => &mut self.nile,
        }
    }

    /// The configured USDT contract, or a configuration error naming the env var to set.
    pub fn usdt_contract(&self, network: Network) -> Result<&str, WalletError> {
        let c = self.profile(network).usdt_contract.trim();
        if c.is_empty() {
            return Err(WalletError::Configuration {
                network,
                env_var: network.usdt_contract_env(),
            });
        }
        Ok(c)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub wallet_dir: PathBuf,
    pub networks: NetworkTable,
    pub trongrid_api_key: Option<String>,
    pub http_timeout: Duration,
    pub read_retry_rounds: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wallet_dir: PathBuf::from(DEFAULT_WALLET_DIR),
            networks: NetworkTable::default(),
            trongrid_api_key: None,
            http_timeout: Duration::from_secs(20),
            read_retry_rounds: 2,
        }
    }
}

fn is_loopback_http(url: &str) -> bool {
    fn host_prefix_ok(s: &str, prefix: &str) -> bool {
        if !s.starts_with(prefix) {
            return false;
        }
        matches!(s.as_bytes().get(prefix.len()), None | Some(b':' | b'/'))
    }
    let u = url.trim();
    host_prefix_ok(u, "http://127.0.0.1")
        || host_prefix_ok(u, "http://localhost")
        || host_prefix_ok(u, "http://[::1]")
}

pub fn ensure_https_or_loopback(url: &str, name: &str) -> eyre::Result<()> {
    let u = url.trim();
    if u.starts_with("https://") || is_loopback_http(u) {
        return Ok(());
    }
    eyre::bail!("{name} must use https (or http://localhost for local testing)");
}

impl Settings {
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build settings from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Self::default();

        if let Some(v) = get("TRON_WALLET_DIR") {
            cfg.wallet_dir = PathBuf::from(v);
        }
        cfg.trongrid_api_key = get("TRONGRID_API_KEY");

        for network in Network::ALL {
            let profile = cfg.networks.profile_mut(network);
            if let Some(v) = get(network.usdt_contract_env()) {
                profile.usdt_contract = v;
            }
            if let Some(v) = get(network.rpc_url_env()) {
                ensure_https_or_loopback(&v, network.rpc_url_env())?;
                profile.endpoint = v.trim_end_matches('/').to_owned();
            }
        }

        if let Some(v) = get("TRON_WALLET_READ_RETRY_ROUNDS") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.read_retry_rounds = n.max(1);
            }
        }
        if let Some(v) = get("TRON_WALLET_HTTP_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                if n > 0 {
                    cfg.http_timeout = Duration::from_secs(n);
                }
            }
        }

        Ok(cfg)
    }
}
