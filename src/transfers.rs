// src/transfers.rs
use tracing::debug;

use crate::day::SECONDS_IN_DAY;
use crate::models::{Network, OutputTransfer, TokenEvent, TokenHolding};

/// Transfers strictly inside `(day, day + 1 day)`, in input order.
///
/// A transfer stamped exactly at `day` is left out; callers rely on this.
pub fn compute_daily_transfers(
    day: i64,
    holdings: &[TokenHolding],
    network: Network,
) -> Vec<OutputTransfer> {
    let day_end = day.saturating_add(SECONDS_IN_DAY);
    let mut output = Vec::new();

    for holding in holdings {
        let before = output.len();
        for event in &holding.events {
            let transfer = match event {
                TokenEvent::Transfer(transfer) => transfer,
                TokenEvent::Flow(_) => continue,
            };
            if transfer.timestamp <= day || transfer.timestamp >= day_end {
                continue;
            }

            output.push(OutputTransfer {
                date: day,
                sender: transfer.sender.clone(),
                recipient: transfer.recipient.clone(),
                tx_hash: transfer.tx_hash.clone(),
                network_id: network,
                amount_token: transfer.value.clone(),
                amount_fiat: String::new(),
                exchange_rate: String::new(),
                token: holding.metadata.clone(),
            });
        }
        debug!(
            token = %holding.metadata.id,
            transfers = output.len() - before,
            "collected transfers for day {}",
            day
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlowEvent, TokenMetadata, TransferEvent};

    const DAY: i64 = 1_700_006_400;

    fn transfer(ts: i64, value: &str) -> TokenEvent {
        TokenEvent::Transfer(TransferEvent {
            id: format!("t-{ts}"),
            timestamp: ts,
            tx_hash: format!("0x{ts:x}"),
            sender: "0xalice".into(),
            recipient: "0xbob".into(),
            value: value.into(),
        })
    }

    fn holding(events: Vec<TokenEvent>) -> TokenHolding {
        TokenHolding {
            metadata: TokenMetadata {
                id: "0xusdc".into(),
                symbol: "USDC".into(),
                name: "USD Coin".into(),
                underlying_address: None,
            },
            events,
        }
    }

    #[test]
    fn window_excludes_both_boundaries() {
        let h = holding(vec![
            transfer(DAY - 1, "1"),
            transfer(DAY, "2"),
            transfer(DAY + 1, "3"),
            transfer(DAY + 86_399, "4"),
            transfer(DAY + 86_400, "5"),
        ]);

        let out = compute_daily_transfers(DAY, &[h], Network::PolygonPos);
        let amounts: Vec<&str> = out.iter().map(|t| t.amount_token.as_str()).collect();
        assert_eq!(amounts, vec!["3", "4"]);
        assert!(out.iter().all(|t| t.date == DAY && t.network_id == Network::PolygonPos));
        assert!(out.iter().all(|t| t.amount_fiat.is_empty() && t.exchange_rate.is_empty()));
    }

    #[test]
    fn flow_events_are_ignored() {
        let h = holding(vec![
            TokenEvent::Flow(FlowEvent {
                id: "f".into(),
                timestamp: DAY + 10,
                tx_hash: "0xf".into(),
                sender: "0xalice".into(),
                recipient: "0xbob".into(),
                old_flow_rate: "0".into(),
                flow_rate: "1".into(),
            }),
            transfer(DAY + 20, "7"),
        ]);

        let out = compute_daily_transfers(DAY, &[h], Network::Xdai);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tx_hash, format!("0x{:x}", DAY + 20));
        assert_eq!(out[0].token.symbol, "USDC");
    }

    #[test]
    fn day_near_the_end_of_time_does_not_overflow() {
        let day = i64::MAX - 100;
        let h = holding(vec![transfer(day, "1"), transfer(i64::MAX - 50, "2")]);

        let out = compute_daily_transfers(day, &[h], Network::Xdai);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].amount_token, "2");
    }
}
