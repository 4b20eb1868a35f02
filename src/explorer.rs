// src/explorer.rs
use eyre::{eyre, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{Network, TokenEvent, TokenHolding, TokenMetadata, TransferEvent};

/// Etherscan-style `tokentx` envelope. `result` is a list on success and a
/// message string otherwise.
#[derive(Debug, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    pub message: String,
    pub result: serde_json::Value,
}

/// One row of `module=account&action=tokentx`
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransfer {
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub value: Option<String>, // missing for NFT transfers on xdai
    pub contract_address: String,
    pub token_name: String,
    pub token_symbol: String,
    #[serde(default)]
    pub log_index: Option<String>,
}

const EMPTY_MESSAGES: [&str; 2] = ["No transactions found", "No token transfers found"];

/// Fetch every ERC20 transfer of `address` and group it into one holding per token
pub async fn fetch_holdings(http: &Client, cfg: &Config, address: &str) -> Result<Vec<TokenHolding>> {
    let mut query = vec![
        ("module", "account"),
        ("action", "tokentx"),
        ("address", address),
        ("sort", "asc"),
    ];
    match (&cfg.explorer_api_key, cfg.network) {
        (Some(key), _) => query.push(("apikey", key.as_str())),
        (None, Network::Xdai) => {}
        (None, network) => return Err(eyre!("no api key provided for {} explorer", network)),
    }

    let url = format!("{}/api", cfg.explorer_url.trim_end_matches('/'));
    info!("📡 Fetching token transfers for {} from {}", address, url);

    let resp = http.get(&url).query(&query).send().await?;
    if resp.status() != StatusCode::OK {
        return Err(eyre!("explorer error: HTTP {}", resp.status()));
    }
    let body: ExplorerResponse = resp.json().await?;

    let holdings = holdings_from_response(body)?;
    debug!("Explorer returned {} token(s) for {}", holdings.len(), address);
    Ok(holdings)
}

/// Normalize an explorer response into holdings with time-ordered events
pub fn holdings_from_response(body: ExplorerResponse) -> Result<Vec<TokenHolding>> {
    if body.status != "1" {
        if EMPTY_MESSAGES.contains(&body.message.as_str()) {
            return Ok(Vec::new());
        }
        return Err(eyre!(
            "explorer query failed: {}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": body.status,
                "message": body.message,
                "result": body.result,
            }))?
        ));
    }

    let rows: Vec<ExplorerTransfer> = serde_json::from_value(body.result)?;

    let mut holdings: Vec<TokenHolding> = Vec::new();
    let mut by_token: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(value) = row.value else {
            continue;
        };
        let timestamp: i64 = row
            .time_stamp
            .parse()
            .map_err(|e| eyre!("bad timeStamp {:?} in {}: {}", row.time_stamp, row.hash, e))?;

        let token_id = row.contract_address.to_lowercase();
        let idx = *by_token.entry(token_id.clone()).or_insert_with(|| {
            holdings.push(TokenHolding {
                metadata: TokenMetadata {
                    id: token_id.clone(),
                    symbol: row.token_symbol.clone(),
                    name: row.token_name.clone(),
                    underlying_address: None,
                },
                events: Vec::new(),
            });
            holdings.len() - 1
        });

        let id = match &row.log_index {
            Some(log_index) => format!("{}-{}", row.hash, log_index),
            None => row.hash.clone(),
        };
        holdings[idx].events.push(TokenEvent::Transfer(TransferEvent {
            id,
            timestamp,
            tx_hash: row.hash,
            sender: row.from,
            recipient: row.to,
            value,
        }));
    }

    for holding in &mut holdings {
        holding.events.sort_by_key(TokenEvent::timestamp);
    }
    Ok(holdings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> ExplorerResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn groups_rows_by_token_in_time_order() {
        let body = response(json!({
            "status": "1",
            "message": "OK",
            "result": [
                {
                    "blockNumber": "2", "timeStamp": "1700000200", "hash": "0xb",
                    "from": "0xalice", "to": "0xbob", "value": "20",
                    "contractAddress": "0xUSDC", "tokenName": "USD Coin", "tokenSymbol": "USDC",
                    "tokenDecimal": "6"
                },
                {
                    "blockNumber": "1", "timeStamp": "1700000100", "hash": "0xa",
                    "from": "0xbob", "to": "0xalice", "value": "10",
                    "contractAddress": "0xusdc", "tokenName": "USD Coin", "tokenSymbol": "USDC",
                    "tokenDecimal": "6"
                },
                {
                    "blockNumber": "3", "timeStamp": "1700000300", "hash": "0xc",
                    "from": "0xalice", "to": "0xcarol", "value": "1",
                    "contractAddress": "0xdai", "tokenName": "Dai", "tokenSymbol": "DAI",
                    "tokenDecimal": "18", "logIndex": "4"
                }
            ]
        }));

        let holdings = holdings_from_response(body).unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].metadata.id, "0xusdc");
        let stamps: Vec<i64> = holdings[0].events.iter().map(TokenEvent::timestamp).collect();
        assert_eq!(stamps, vec![1_700_000_100, 1_700_000_200]);

        let TokenEvent::Transfer(dai) = &holdings[1].events[0] else {
            panic!("expected a transfer");
        };
        assert_eq!(dai.id, "0xc-4");
        assert_eq!(dai.value, "1");
        assert_eq!(holdings[1].metadata.underlying_address, None);
    }

    #[test]
    fn drops_rows_without_value() {
        let body = response(json!({
            "status": "1",
            "message": "OK",
            "result": [{
                "timeStamp": "1700000100", "hash": "0xnft", "from": "0x0", "to": "0xalice",
                "contractAddress": "0xpoap", "tokenName": "POAP", "tokenSymbol": "POAP"
            }]
        }));
        assert!(holdings_from_response(body).unwrap().is_empty());
    }

    #[test]
    fn empty_and_failed_responses() {
        let empty = response(json!({"status": "0", "message": "No token transfers found", "result": []}));
        assert!(holdings_from_response(empty).unwrap().is_empty());

        let failed = response(json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"}));
        let err = holdings_from_response(failed).unwrap_err().to_string();
        assert!(err.contains("Invalid API Key"));
    }
}
