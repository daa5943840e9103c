use crate::{
    FaucetError,
    Result,
    protocol::{
        AFCAPTCHA_APP_ID,
        FAUCET_APP_ID,
        MAINNET_GENESIS_PREFIX,
    },
    retry::RetryPolicy,
};
use std::{
    fmt,
    time::Duration,
};

pub const DEFAULT_MAINNET_NODE_URL: &str = "https://mainnet-api.algonode.cloud";
pub const DEFAULT_TESTNET_NODE_URL: &str = "https://testnet-api.algonode.cloud";
pub const DEFAULT_LOCAL_NODE_URL: &str = "http://localhost:4001";

pub const NODE_URL_VAR: &str = "ALGOD_SERVER";
pub const NODE_TOKEN_VAR: &str = "ALGOD_TOKEN";
pub const CAPTCHA_APP_VAR: &str = "AFCAPTCHA_APP_ID";
pub const FAUCET_APP_VAR: &str = "FAUCET_APP_ID";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Network {
    #[default]
    #[value(name = "mainnet")]
    MainNet,
    #[value(name = "testnet")]
    TestNet,
    #[value(name = "localnet")]
    LocalNet,
}

impl Network {
    pub fn default_node_url(&self) -> &'static str {
        match self {
            Network::MainNet => DEFAULT_MAINNET_NODE_URL,
            Network::TestNet => DEFAULT_TESTNET_NODE_URL,
            Network::LocalNet => DEFAULT_LOCAL_NODE_URL,
        }
    }

    /// Whether a node reporting `genesis_id` belongs to this network.
    pub fn accepts_genesis(&self, genesis_id: &str) -> bool {
        let genesis_id = genesis_id.to_lowercase();
        match self {
            Network::MainNet => genesis_id.starts_with(MAINNET_GENESIS_PREFIX),
            Network::TestNet => genesis_id.starts_with("testnet"),
            Network::LocalNet => true,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::MainNet => "mainnet",
            Network::TestNet => "testnet",
            Network::LocalNet => "localnet",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppIds {
    pub faucet: u64,
    pub captcha: u64,
}

impl Default for AppIds {
    fn default() -> Self {
        Self {
            faucet: FAUCET_APP_ID,
            captcha: AFCAPTCHA_APP_ID,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaucetConfig {
    pub network: Network,
    pub node_url: String,
    pub node_token: Option<String>,
    pub apps: AppIds,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub captcha_poll_interval: Duration,
    pub balance_poll_interval: Duration,
}

impl FaucetConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            node_url: network.default_node_url().to_owned(),
            node_token: None,
            apps: AppIds::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(8),
            captcha_poll_interval: Duration::from_secs(2),
            balance_poll_interval: Duration::from_secs(3),
        }
    }

    /// Defaults for `network` with overrides read through `lookup`.
    pub fn from_lookup<F>(network: Network, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(network);
        let read = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        if let Some(url) = read(NODE_URL_VAR) {
            config.node_url = url;
        }
        config.node_token = read(NODE_TOKEN_VAR);
        if let Some(raw) = read(CAPTCHA_APP_VAR) {
            config.apps.captcha = parse_app_id(CAPTCHA_APP_VAR, &raw)?;
        }
        if let Some(raw) = read(FAUCET_APP_VAR) {
            config.apps.faucet = parse_app_id(FAUCET_APP_VAR, &raw)?;
        }
        Ok(config)
    }

    pub fn from_env(network: Network) -> Result<Self> {
        Self::from_lookup(network, |name| std::env::var(name).ok())
    }
}

fn parse_app_id(name: &str, raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| FaucetError::Config(format!("{name} must be an application id, got {raw:?}")))
}
