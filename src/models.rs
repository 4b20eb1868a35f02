// src/models.rs
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Marker stored in `OutputFlow::end` while a stream is still open.
pub const OPEN_END: i64 = -1;

/// Chains the aggregation runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "xdai")]
    Xdai,
    #[serde(rename = "polygon-pos")]
    PolygonPos,
    #[serde(rename = "ethereum")]
    Ethereum,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Xdai => "xdai",
            Network::PolygonPos => "polygon-pos",
            Network::Ethereum => "ethereum",
        }
    }

    pub fn chain_id(&self) -> &'static str {
        match self {
            Network::Xdai => "0x64",
            Network::PolygonPos => "0x89",
            Network::Ethereum => "0x01",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xdai" | "0x64" => Ok(Network::Xdai),
            "polygon-pos" | "polygon" | "0x89" => Ok(Network::PolygonPos),
            "ethereum" | "0x01" | "0x1" => Ok(Network::Ethereum),
            other => Err(eyre::eyre!("unknown network: {}", other)),
        }
    }
}

/// Token identity. `underlying_address` is only set for wrapped, stream-capable tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_address: Option<String>,
}

/// A discrete token transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
    pub id: String,
    pub timestamp: i64,
    pub tx_hash: String,
    pub sender: String,
    pub recipient: String,
    pub value: String,
}

/// A stream lifecycle event: start (old rate 0), stop (new rate 0) or rate update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEvent {
    pub id: String,
    pub timestamp: i64,
    pub tx_hash: String,
    pub sender: String,
    pub recipient: String,
    pub old_flow_rate: String,
    pub flow_rate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenEvent {
    Transfer(TransferEvent),
    Flow(FlowEvent),
}

impl TokenEvent {
    pub fn timestamp(&self) -> i64 {
        match self {
            TokenEvent::Transfer(t) => t.timestamp,
            TokenEvent::Flow(f) => f.timestamp,
        }
    }
}

/// One token held by an address, with its events in ascending timestamp order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub metadata: TokenMetadata,
    pub events: Vec<TokenEvent>,
}

/// Settled amount of one stream for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFlow {
    pub date: i64,
    pub start: i64,
    pub end: i64,
    pub sender: String,
    pub recipient: String,
    pub network_id: Network,
    pub tx_hash: String,
    pub amount_token: String,
    pub amount_fiat: String,
    pub exchange_rate: String,
    pub token: TokenMetadata,
}

impl OutputFlow {
    pub fn is_open(&self) -> bool {
        self.end == OPEN_END
    }
}

/// A transfer that happened inside one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTransfer {
    pub date: i64,
    pub sender: String,
    pub recipient: String,
    pub tx_hash: String,
    pub network_id: Network,
    pub amount_token: String,
    pub amount_fiat: String,
    pub exchange_rate: String,
    pub token: TokenMetadata,
}

/// Wrapping direction of a grade event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeKind {
    /// underlying token wrapped into the stream token
    Upgrade,
    /// stream token unwrapped back to the underlying
    Downgrade,
}

impl GradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeKind::Upgrade => "upgrade",
            GradeKind::Downgrade => "downgrade",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeTransaction {
    pub id: String,
    pub timestamp: i64,
}

/// An upgrade or downgrade between a stream token and its underlying asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEvent {
    pub id: String,
    pub kind: GradeKind,
    pub network_id: Network,
    pub transaction: GradeTransaction,
    pub token: TokenMetadata,
    pub amount: String,
}

/// Everything stored for one address, as served by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDocument {
    pub address: String,
    pub flow_state: Vec<OutputFlow>,
    pub transfers: Vec<OutputTransfer>,
    pub grade_events: Vec<GradeEvent>,
}
