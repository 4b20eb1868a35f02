use alloy::primitives::Address;
use dotenvy::dotenv;
use eyre::Result;
use std::{env, fmt, time::Duration};
use tracing::{info, warn};

use crate::models::Network;

#[derive(Clone)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    pub network: Network,
    pub addresses: Vec<String>,   // lowercase 0x-hex
    pub explorer_url: String,
    pub explorer_api_key: Option<String>,
    pub subgraph_url: String,
    pub backfill_days: u32,
    pub request_pause: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_path", &self.db_path)
            .field("port", &self.port)
            .field("network", &self.network)
            .field("addresses", &self.addresses)
            .field("explorer_url", &self.explorer_url)
            .field("explorer_api_key", &self.explorer_api_key.as_ref().map(|_| "<redacted>"))
            .field("subgraph_url", &self.subgraph_url)
            .field("backfill_days", &self.backfill_days)
            .field("request_pause", &self.request_pause)
            .finish()
    }
}

pub fn default_explorer_url(network: Network) -> &'static str {
    match network {
        Network::Xdai => "https://blockscout.com/xdai/mainnet",
        Network::PolygonPos => "https://api.polygonscan.com",
        Network::Ethereum => "https://api.etherscan.io",
    }
}

pub fn default_subgraph_url(network: Network) -> &'static str {
    match network {
        Network::Xdai => "https://api.thegraph.com/subgraphs/name/superfluid-finance/protocol-v1-xdai",
        Network::PolygonPos => {
            "https://api.thegraph.com/subgraphs/name/superfluid-finance/protocol-v1-matic"
        }
        Network::Ethereum => {
            "https://api.thegraph.com/subgraphs/name/superfluid-finance/protocol-v1-eth-mainnet"
        }
    }
}

/// Comma-separated EVM addresses; invalid entries are skipped.
pub fn parse_addresses(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match entry.parse::<Address>() {
            Ok(addr) => {
                let addr = format!("{addr:#x}");
                if !out.contains(&addr) {
                    out.push(addr);
                }
            }
            Err(e) => warn!("Skipping invalid address {:?}: {}", entry, e),
        }
    }
    out
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "accounts.db".to_string());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .unwrap_or(5000);

    let network: Network = env::var("NETWORK")
        .unwrap_or_else(|_| "polygon-pos".to_string())
        .parse()?;

    let addresses = parse_addresses(&env::var("ACCOUNT_ADDRESSES").unwrap_or_default());

    let explorer_url = env::var("EXPLORER_URL")
        .unwrap_or_else(|_| default_explorer_url(network).to_string());

    let explorer_api_key = env::var("EXPLORER_API_KEY").ok().filter(|k| !k.is_empty());

    let subgraph_url = env::var("SUBGRAPH_URL")
        .unwrap_or_else(|_| default_subgraph_url(network).to_string());

    let backfill_days = env::var("BACKFILL_DAYS")
        .unwrap_or_else(|_| "7".to_string())
        .parse::<u32>()
        .unwrap_or(7)
        .max(1);

    let request_pause = Duration::from_millis(
        env::var("REQUEST_PAUSE_MS")
            .unwrap_or_else(|_| "200".to_string())
            .parse()
            .unwrap_or(200),
    );

    let cfg = Config {
        db_path,
        port,
        network,
        addresses,
        explorer_url,
        explorer_api_key,
        subgraph_url,
        backfill_days,
        request_pause,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
