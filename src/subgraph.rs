// src/subgraph.rs
use eyre::{eyre, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{
    FlowEvent, GradeEvent, GradeKind, GradeTransaction, Network, TokenEvent, TokenHolding,
    TokenMetadata, TransferEvent,
};

const ACCOUNT_TOKENS_QUERY: &str = r#"
query AccountTokens($id: ID!) {
  account(id: $id) {
    accountTokens {
      id
      token { id name symbol underlyingAddress }
      inTransfers { ...transfer }
      outTransfers { ...transfer }
      flows {
        id
        inFlows { ...flow }
        outFlows { ...flow }
      }
      gradeEvents {
        id
        upgradeEvents { id transaction { id timestamp } token { id name symbol underlyingAddress } amount }
        downgradeEvents { id transaction { id timestamp } token { id name symbol underlyingAddress } amount }
      }
    }
  }
}

fragment transfer on Transfer {
  id
  transaction { id timestamp }
  from { id account { id } }
  to { id account { id } }
  value
}

fragment flow on Flow {
  id
  flowRate
  lastUpdate
  owner { id }
  recipient { id }
  events {
    id
    transaction { id timestamp }
    oldFlowRate
    flowRate
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    account: Option<QueryAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryAccount {
    account_tokens: Vec<QueryAccountToken>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryAccountToken {
    pub id: String,
    pub token: QueryToken,
    #[serde(default)]
    pub in_transfers: Vec<QueryTransfer>,
    #[serde(default)]
    pub out_transfers: Vec<QueryTransfer>,
    pub flows: QueryFlows,
    #[serde(default)]
    pub grade_events: QueryGradeEvents,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryToken {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub underlying_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryTransaction {
    pub id: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryId {
    pub id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryParty {
    pub id: String,
    pub account: QueryId,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryTransfer {
    pub id: String,
    pub transaction: QueryTransaction,
    pub from: QueryParty,
    pub to: QueryParty,
    pub value: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryFlows {
    #[serde(default)]
    pub in_flows: Vec<QueryFlow>,
    #[serde(default)]
    pub out_flows: Vec<QueryFlow>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryFlow {
    pub id: String,
    pub owner: QueryId,
    pub recipient: QueryId,
    #[serde(default)]
    pub events: Vec<QueryFlowEvent>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryGradeEvents {
    #[serde(default)]
    pub upgrade_events: Vec<QueryGradeEvent>,
    #[serde(default)]
    pub downgrade_events: Vec<QueryGradeEvent>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryGradeEvent {
    pub id: String,
    pub transaction: QueryTransaction,
    pub token: QueryToken,
    pub amount: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryFlowEvent {
    pub id: String,
    pub transaction: QueryTransaction,
    pub old_flow_rate: String,
    pub flow_rate: String,
}

/// Holdings and grade events of one account, as reported by the subgraph
#[derive(Debug, Default)]
pub struct SubgraphAccount {
    pub holdings: Vec<TokenHolding>,
    pub grade_events: Vec<GradeEvent>,
}

/// Fetch the stream-capable tokens of `address` with their transfers, flow and grade events
pub async fn fetch_account(http: &Client, cfg: &Config, address: &str) -> Result<SubgraphAccount> {
    info!("📡 Querying subgraph for {} → {}", address, cfg.subgraph_url);

    let payload = json!({
        "query": ACCOUNT_TOKENS_QUERY,
        "variables": { "id": address.to_lowercase() },
    });
    let resp = http.post(&cfg.subgraph_url).json(&payload).send().await?;
    if resp.status() != StatusCode::OK {
        return Err(eyre!("subgraph error: HTTP {}", resp.status()));
    }

    let parsed: GraphResponse<AccountData> = resp.json().await?;
    if !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
        return Err(eyre!("subgraph query failed: {}", messages.join("; ")));
    }

    let tokens = parsed
        .data
        .and_then(|d| d.account)
        .map(|a| a.account_tokens)
        .unwrap_or_default();

    let account = account_from_tokens(tokens, cfg.network)?;
    debug!(
        "Subgraph returned {} token(s), {} grade event(s) for {}",
        account.holdings.len(),
        account.grade_events.len(),
        address
    );
    Ok(account)
}

/// Normalize every account token; grade events of all tokens are merged in time order
pub fn account_from_tokens(tokens: Vec<QueryAccountToken>, network: Network) -> Result<SubgraphAccount> {
    let mut account = SubgraphAccount::default();
    for mut token in tokens {
        let grades = std::mem::take(&mut token.grade_events);
        account.grade_events.extend(grade_events_from(grades, network)?);
        account.holdings.push(holding_from_account_token(token)?);
    }
    account.grade_events.sort_by_key(|e| e.transaction.timestamp);
    Ok(account)
}

fn grade_events_from(grades: QueryGradeEvents, network: Network) -> Result<Vec<GradeEvent>> {
    let upgrades = grades.upgrade_events.into_iter().map(|e| (GradeKind::Upgrade, e));
    let downgrades = grades.downgrade_events.into_iter().map(|e| (GradeKind::Downgrade, e));

    upgrades
        .chain(downgrades)
        .map(|(kind, e)| {
            Ok(GradeEvent {
                transaction: GradeTransaction {
                    timestamp: parse_timestamp(&e.transaction)?,
                    id: e.transaction.id,
                },
                id: e.id,
                kind,
                network_id: network,
                token: token_metadata(e.token),
                amount: e.amount,
            })
        })
        .collect()
}

/// Flatten one account token into a holding with time-ordered events
pub fn holding_from_account_token(account_token: QueryAccountToken) -> Result<TokenHolding> {
    let QueryAccountToken {
        token,
        in_transfers,
        out_transfers,
        flows,
        ..
    } = account_token;

    let mut events = Vec::new();

    for transfer in in_transfers.into_iter().chain(out_transfers) {
        events.push(TokenEvent::Transfer(TransferEvent {
            timestamp: parse_timestamp(&transfer.transaction)?,
            id: transfer.id,
            tx_hash: transfer.transaction.id,
            sender: transfer.from.account.id,
            recipient: transfer.to.account.id,
            value: transfer.value,
        }));
    }

    for flow in flows.in_flows.into_iter().chain(flows.out_flows) {
        for event in flow.events {
            events.push(TokenEvent::Flow(FlowEvent {
                timestamp: parse_timestamp(&event.transaction)?,
                id: event.id,
                tx_hash: event.transaction.id,
                sender: flow.owner.id.clone(),
                recipient: flow.recipient.id.clone(),
                old_flow_rate: event.old_flow_rate,
                flow_rate: event.flow_rate,
            }));
        }
    }

    events.sort_by_key(TokenEvent::timestamp);

    Ok(TokenHolding {
        metadata: token_metadata(token),
        events,
    })
}

fn token_metadata(token: QueryToken) -> TokenMetadata {
    TokenMetadata {
        id: token.id,
        symbol: token.symbol,
        name: token.name,
        underlying_address: Some(token.underlying_address),
    }
}

fn parse_timestamp(tx: &QueryTransaction) -> Result<i64> {
    tx.timestamp
        .parse()
        .map_err(|e| eyre!("bad timestamp {:?} on {}: {}", tx.timestamp, tx.id, e))
}
