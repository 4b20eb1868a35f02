use chrono::{Duration as ChronoDuration, Utc};
use eyre::{eyre, Result};
use futures_util::future::try_join;
use reqwest::Client;
use rusqlite::Connection;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::day::{self, SECONDS_IN_DAY};
use crate::error::AccountingError;
use crate::flows::compute_daily_flows;
use crate::grades::grade_events_for_day;
use crate::models::{GradeEvent, Network, OutputFlow, OutputTransfer, TokenHolding};
use crate::transfers::compute_daily_transfers;
use crate::{db, explorer, subgraph};

/// Everything recorded for one address on one day
#[derive(Debug, Default)]
pub struct DayRecord {
    pub flows: Vec<OutputFlow>,
    pub transfers: Vec<OutputTransfer>,
    pub grade_events: Vec<GradeEvent>,
}

/// Wait after midnight before aggregating, so the last blocks of the day are indexed upstream
const SETTLE_DELAY_SECS: i64 = 60;

pub async fn run(cfg: Config, conn: Arc<Mutex<Connection>>) -> Result<()> {
    let http = Client::builder().timeout(Duration::from_secs(15)).build()?;

    info!(
        "Aggregation job started for {} address(es) on {}",
        cfg.addresses.len(),
        cfg.network
    );
    if cfg.addresses.is_empty() {
        warn!("No ACCOUNT_ADDRESSES configured, the job will idle");
    }

    loop {
        let last = day::last_complete_day(Utc::now());
        let first = last - (i64::from(cfg.backfill_days) - 1) * SECONDS_IN_DAY;
        let days = day::days_between(first, last);
        info!("Aggregating {} → {}", day::label(first), day::label(last));

        let mut recorded = 0;
        for address in &cfg.addresses {
            match aggregate_address(&cfg, &http, &conn, address, &days).await {
                Ok(n) => recorded += n,
                // days left unrecorded are retried on the next run
                Err(e) => error!("Aggregation failed for {}: {:?}", address, e),
            }
            sleep(cfg.request_pause).await; // avoid hammering upstream
        }
        info!("Run complete → {} address-day(s) recorded", recorded);

        let wake = day::next_midnight(Utc::now()) + ChronoDuration::seconds(SETTLE_DELAY_SECS);
        let wait = (wake - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(SETTLE_DELAY_SECS as u64));
        debug!("Sleeping {:?} until next run", wait);
        sleep(wait).await;
    }
}

async fn aggregate_address(
    cfg: &Config,
    http: &Client,
    conn: &Arc<Mutex<Connection>>,
    address: &str,
    days: &[i64],
) -> Result<usize> {
    let pending = pending_days(conn, address, days)?;
    if pending.is_empty() {
        debug!("{} is up to date", address);
        return Ok(0);
    }

    // the explorer request starts `request_pause` after the subgraph one
    let (streamed, erc20) = try_join(
        subgraph::fetch_account(http, cfg, address),
        paced(cfg.request_pause, explorer::fetch_holdings(http, cfg, address)),
    )
    .await?;
    let holdings = merge_holdings(streamed.holdings, erc20);

    let mut recorded = 0;
    for day in pending {
        let record = account_day(day, &holdings, &streamed.grade_events, cfg.network)?;
        if store_day(conn, address, day, &record)? {
            recorded += 1;
        }
        info!(
            "{} {} → {} flow(s), {} transfer(s), {} grade event(s)",
            address,
            day::label(day),
            record.flows.len(),
            record.transfers.len(),
            record.grade_events.len()
        );
    }
    Ok(recorded)
}

/// Wait `pause`, then drive `fut`
pub async fn paced<F: Future>(pause: Duration, fut: F) -> F::Output {
    sleep(pause).await;
    fut.await
}

/// Run both accountants for one day and pick that day's grade events
pub fn account_day(
    day: i64,
    holdings: &[TokenHolding],
    grade_events: &[GradeEvent],
    network: Network,
) -> std::result::Result<DayRecord, AccountingError> {
    Ok(DayRecord {
        flows: compute_daily_flows(day, holdings, network)?,
        transfers: compute_daily_transfers(day, holdings, network),
        grade_events: grade_events_for_day(day, grade_events),
    })
}

/// Subgraph holdings first; explorer holdings only for tokens the subgraph did not report.
pub fn merge_holdings(streamed: Vec<TokenHolding>, erc20: Vec<TokenHolding>) -> Vec<TokenHolding> {
    let known: HashSet<String> = streamed
        .iter()
        .map(|h| h.metadata.id.to_lowercase())
        .collect();

    let mut merged = streamed;
    merged.extend(
        erc20
            .into_iter()
            .filter(|h| !known.contains(&h.metadata.id.to_lowercase())),
    );
    merged
}

fn pending_days(conn: &Arc<Mutex<Connection>>, address: &str, days: &[i64]) -> Result<Vec<i64>> {
    let db = conn.lock().map_err(|_| eyre!("database mutex poisoned"))?;
    let mut pending = Vec::new();
    for &day in days {
        if !db::is_day_processed(&db, address, day)? {
            pending.push(day);
        }
    }
    Ok(pending)
}

fn store_day(
    conn: &Arc<Mutex<Connection>>,
    address: &str,
    day: i64,
    record: &DayRecord,
) -> Result<bool> {
    let mut db = conn.lock().map_err(|_| eyre!("database mutex poisoned"))?;
    db::record_day(
        &mut db,
        address,
        day,
        &record.flows,
        &record.transfers,
        &record.grade_events,
    )
}
