use stream_ledger::models::{
    FlowEvent, Network, OutputFlow, TokenEvent, TokenHolding, TokenMetadata, TransferEvent, OPEN_END,
};
use stream_ledger::{compute_daily_flows, compute_daily_transfers, AccountingError};

// 2023-11-15 00:00:00 UTC
const DAY: i64 = 1_700_006_400;
const ONE_TOKEN: &str = "1000000000000000000";

fn super_token(id: &str) -> TokenMetadata {
    TokenMetadata {
        id: id.to_string(),
        symbol: "DAIx".to_string(),
        name: "Super DAI".to_string(),
        underlying_address: Some("0xdai".to_string()),
    }
}

fn flow(ts: i64, recipient: &str, old: &str, new: &str) -> TokenEvent {
    TokenEvent::Flow(FlowEvent {
        id: format!("flow-{recipient}-{ts}"),
        timestamp: ts,
        tx_hash: format!("0xf{ts:x}"),
        sender: "0xalice".to_string(),
        recipient: recipient.to_string(),
        old_flow_rate: old.to_string(),
        flow_rate: new.to_string(),
    })
}

fn transfer(ts: i64, value: &str) -> TokenEvent {
    TokenEvent::Transfer(TransferEvent {
        id: format!("transfer-{ts}"),
        timestamp: ts,
        tx_hash: format!("0xt{ts:x}"),
        sender: "0xbob".to_string(),
        recipient: "0xalice".to_string(),
        value: value.to_string(),
    })
}

fn holding(token: &str, events: Vec<TokenEvent>) -> TokenHolding {
    TokenHolding {
        metadata: super_token(token),
        events,
    }
}

fn daily_flows(events: Vec<TokenEvent>) -> Result<Vec<OutputFlow>, AccountingError> {
    compute_daily_flows(DAY, &[holding("0xdaix", events)], Network::Xdai)
}

#[test]
fn stream_open_all_day_settles_rate_times_day() {
    let flows = daily_flows(vec![flow(DAY - 5_000, "0xbob", "0", ONE_TOKEN)]).unwrap();

    assert_eq!(flows.len(), 1);
    let f = &flows[0];
    assert_eq!(f.amount_token, "86400000000000000000000");
    assert_eq!(f.date, DAY);
    assert_eq!(f.start, DAY - 5_000);
    assert_eq!(f.end, OPEN_END);
    assert!(f.is_open());
    assert_eq!(f.tx_hash, format!("0xf{:x}", DAY - 5_000));
    assert_eq!(f.network_id, Network::Xdai);
    assert!(f.amount_fiat.is_empty() && f.exchange_rate.is_empty());
    assert_eq!(f.token, super_token("0xdaix"));
}

#[test]
fn one_rate_change_counts_only_the_segment_before_it() {
    let flows = daily_flows(vec![
        flow(DAY - 10, "0xbob", "0", ONE_TOKEN),
        flow(DAY + 3_600, "0xbob", ONE_TOKEN, "2000000000000000000"),
    ])
    .unwrap();

    assert_eq!(flows.len(), 1);
    // 3600 * R1; the remainder of the day at R2 is not settled
    assert_eq!(flows[0].amount_token, "3600000000000000000000");
    assert_eq!(flows[0].end, OPEN_END);
}

#[test]
fn several_rate_changes_chain_their_previous_rates() {
    let flows = daily_flows(vec![
        flow(DAY - 10, "0xbob", "0", "10"),
        flow(DAY + 100, "0xbob", "10", "20"),
        flow(DAY + 250, "0xbob", "20", "30"),
        flow(DAY + 1_000, "0xbob", "30", "0"),
    ])
    .unwrap();

    // 100 * 10 + 150 * 20
    assert_eq!(flows[0].amount_token, "4000");
    assert_eq!(flows[0].end, DAY + 1_000);
}

#[test]
fn stop_during_day_keeps_full_day_amount() {
    let flows = daily_flows(vec![
        flow(DAY - 10, "0xbob", "0", "5"),
        flow(DAY + 7_200, "0xbob", "5", "0"),
    ])
    .unwrap();

    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].end, DAY + 7_200);
    // no rate change recorded, so the whole-day branch applies
    assert_eq!(flows[0].amount_token, "432000");
}

#[test]
fn stream_started_during_day_is_settled() {
    let flows = daily_flows(vec![flow(DAY + 600, "0xbob", "0", "2")]).unwrap();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].start, DAY + 600);
    assert_eq!(flows[0].amount_token, "172800");
}

#[test]
fn pre_day_history_is_folded_into_state_at_day_start() {
    let flows = daily_flows(vec![
        flow(DAY - 900, "0xbob", "0", "1"),
        flow(DAY - 800, "0xbob", "1", "3"),
        flow(DAY - 700, "0xcarol", "0", "4"),
        flow(DAY - 600, "0xcarol", "4", "0"),
        flow(DAY + 86_400, "0xdave", "0", "9"),
    ])
    .unwrap();

    // carol stopped before the day, dave starts the next day
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].recipient, "0xbob");
    assert_eq!(flows[0].amount_token, (3 * 86_400).to_string());
}

#[test]
fn transfers_do_not_produce_flows() {
    let flows = daily_flows(vec![transfer(DAY + 5, "100")]).unwrap();
    assert!(flows.is_empty());
}

#[test]
fn lifecycle_errors_abort_the_call() {
    let duplicate = daily_flows(vec![
        flow(DAY - 10, "0xbob", "0", "1"),
        flow(DAY + 10, "0xbob", "0", "2"),
    ]);
    assert_eq!(
        duplicate,
        Err(AccountingError::DuplicateFlowStart {
            sender: "0xalice".into(),
            recipient: "0xbob".into(),
            token: "0xdaix".into(),
        })
    );

    let unknown_stop = daily_flows(vec![flow(DAY - 10, "0xbob", "1", "0")]);
    assert!(matches!(unknown_stop, Err(AccountingError::UnknownFlowStop { .. })));

    let unknown_update = daily_flows(vec![flow(DAY + 10, "0xbob", "1", "2")]);
    assert!(matches!(unknown_update, Err(AccountingError::UnknownFlowUpdate { .. })));

    // a bad holding fails the whole call even when another one is fine
    let holdings = [
        holding("0xusdcx", vec![flow(DAY - 10, "0xbob", "0", "1")]),
        holding("0xdaix", vec![flow(DAY - 10, "0xbob", "1", "0")]),
    ];
    assert!(compute_daily_flows(DAY, &holdings, Network::Xdai).is_err());
}

#[test]
fn restart_after_in_day_stop_is_a_duplicate() {
    let result = daily_flows(vec![
        flow(DAY + 10, "0xbob", "0", "1"),
        flow(DAY + 20, "0xbob", "1", "0"),
        flow(DAY + 30, "0xbob", "0", "1"),
    ]);
    assert!(matches!(result, Err(AccountingError::DuplicateFlowStart { .. })));
}

#[test]
fn replay_is_deterministic() {
    let holdings = vec![holding(
        "0xdaix",
        vec![
            flow(DAY - 50, "0xcarol", "0", "7"),
            flow(DAY - 40, "0xbob", "0", "3"),
            flow(DAY + 40, "0xdave", "0", "1"),
            flow(DAY + 90, "0xbob", "3", "8"),
        ],
    )];

    let first = compute_daily_flows(DAY, &holdings, Network::PolygonPos).unwrap();
    let second = compute_daily_flows(DAY, &holdings, Network::PolygonPos).unwrap();
    assert_eq!(first, second);

    let recipients: Vec<&str> = first.iter().map(|f| f.recipient.as_str()).collect();
    assert_eq!(recipients, vec!["0xcarol", "0xbob", "0xdave"]);
}

#[test]
fn holdings_do_not_interfere() {
    // same sender/recipient pair streaming two different tokens
    let dai = holding(
        "0xdaix",
        vec![
            flow(DAY - 10, "0xbob", "0", "4"),
            transfer(DAY + 30, "11"),
        ],
    );
    let usdc = holding(
        "0xusdcx",
        vec![
            flow(DAY - 20, "0xbob", "0", "6"),
            flow(DAY + 60, "0xbob", "6", "0"),
            transfer(DAY + 20, "22"),
        ],
    );

    let key = |f: &OutputFlow| (f.token.id.clone(), f.sender.clone(), f.recipient.clone());

    let mut forward = compute_daily_flows(DAY, &[dai.clone(), usdc.clone()], Network::Xdai).unwrap();
    let mut backward = compute_daily_flows(DAY, &[usdc.clone(), dai.clone()], Network::Xdai).unwrap();
    forward.sort_by_key(key);
    backward.sort_by_key(key);
    assert_eq!(forward, backward);
    assert_eq!(forward.len(), 2);

    let alone = compute_daily_flows(DAY, std::slice::from_ref(&dai), Network::Xdai).unwrap();
    assert_eq!(alone.len(), 1);
    assert_eq!(alone[0].amount_token, (4 * 86_400).to_string());

    let mut t_forward = compute_daily_transfers(DAY, &[dai.clone(), usdc.clone()], Network::Xdai);
    let mut t_backward = compute_daily_transfers(DAY, &[usdc, dai], Network::Xdai);
    t_forward.sort_by(|a, b| a.tx_hash.cmp(&b.tx_hash));
    t_backward.sort_by(|a, b| a.tx_hash.cmp(&b.tx_hash));
    assert_eq!(t_forward, t_backward);
}

#[test]
fn transfer_window_is_open_at_both_ends() {
    let h = holding(
        "0xusdc",
        vec![
            transfer(DAY, "1"),
            transfer(DAY + 1, "2"),
            transfer(DAY + 86_399, "3"),
            transfer(DAY + 86_400, "4"),
        ],
    );

    let out = compute_daily_transfers(DAY, &[h], Network::Ethereum);
    let amounts: Vec<&str> = out.iter().map(|t| t.amount_token.as_str()).collect();
    assert_eq!(amounts, vec!["2", "3"]);
    assert_eq!(out[0].sender, "0xbob");
    assert_eq!(out[0].recipient, "0xalice");
    assert_eq!(out[0].tx_hash, format!("0xt{:x}", DAY + 1));
    assert_eq!(out[0].date, DAY);
}

#[test]
fn flow_window_includes_day_start() {
    // a flow start at exactly `day` is an in-day event
    let flows = daily_flows(vec![
        flow(DAY, "0xbob", "0", "1"),
        flow(DAY + 10, "0xbob", "1", "2"),
    ])
    .unwrap();
    assert_eq!(flows[0].amount_token, "10");
}
