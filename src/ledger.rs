// src/ledger.rs
//! Index of the streams open for an account, keyed by (sender, recipient, token).
use num_traits::Zero;
use std::collections::HashMap;
use tracing::trace;

use crate::error::{AccountingError, Result};
use crate::integrator::parse_amount;
use crate::models::{FlowEvent, TokenMetadata};

/// Stream identity. At most one open stream exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub sender: String,
    pub recipient: String,
    pub token_id: String,
}

impl FlowKey {
    pub fn of(event: &FlowEvent, token: &TokenMetadata) -> Self {
        Self {
            sender: event.sender.clone(),
            recipient: event.recipient.clone(),
            token_id: token.id.clone(),
        }
    }
}

/// Rate in force before an in-day update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateChange {
    pub timestamp: i64,
    pub previous_flow_rate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFlow {
    pub start: i64,
    /// `None` while the stream is running.
    pub end: Option<i64>,
    pub sender: String,
    pub recipient: String,
    /// Hash of the transaction that started the stream.
    pub tx_hash: String,
    pub token: TokenMetadata,
    pub flow_rate: String,
    /// Only updates observed during the day being computed.
    pub rate_changes: Vec<RateChange>,
}

/// Which side of the day boundary events are being replayed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Stops delete the stream, updates overwrite the rate silently.
    BeforeDay,
    /// Stops only set `end`, updates are recorded as rate changes.
    DuringDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Start,
    Stop,
    Update,
}

impl FlowAction {
    /// old rate 0 => start, new rate 0 => stop, otherwise update.
    pub fn classify(event: &FlowEvent) -> Result<Self> {
        let old_zero = parse_amount(&event.old_flow_rate)?.is_zero();
        let new_zero = parse_amount(&event.flow_rate)?.is_zero();
        match (old_zero, new_zero) {
            (true, true) => Err(AccountingError::InvalidFlowEvent {
                id: event.id.clone(),
            }),
            (true, false) => Ok(FlowAction::Start),
            (false, true) => Ok(FlowAction::Stop),
            (false, false) => Ok(FlowAction::Update),
        }
    }
}

#[derive(Debug, Default)]
pub struct FlowLedger {
    flows: HashMap<FlowKey, OpenFlow>,
}

impl FlowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn get(&self, key: &FlowKey) -> Option<&OpenFlow> {
        self.flows.get(key)
    }

    /// Classify `event` and apply it with the rules of `phase`.
    pub fn apply(&mut self, event: &FlowEvent, token: &TokenMetadata, phase: Phase) -> Result<()> {
        let action = FlowAction::classify(event)?;
        trace!(id = %event.id, ?action, ?phase, "applying flow event");
        match action {
            FlowAction::Start => self.apply_start(event, token),
            FlowAction::Stop => self.apply_stop(event, token, phase),
            FlowAction::Update => self.apply_update(event, token, phase),
        }
    }

    pub fn apply_start(&mut self, event: &FlowEvent, token: &TokenMetadata) -> Result<()> {
        let key = FlowKey::of(event, token);
        if self.flows.contains_key(&key) {
            return Err(AccountingError::DuplicateFlowStart {
                sender: key.sender,
                recipient: key.recipient,
                token: key.token_id,
            });
        }

        let flow = OpenFlow {
            start: event.timestamp,
            end: None,
            sender: event.sender.clone(),
            recipient: event.recipient.clone(),
            tx_hash: event.tx_hash.clone(),
            token: token.clone(),
            flow_rate: event.flow_rate.clone(),
            rate_changes: Vec::new(),
        };
        self.flows.insert(key, flow);
        Ok(())
    }

    pub fn apply_stop(&mut self, event: &FlowEvent, token: &TokenMetadata, phase: Phase) -> Result<()> {
        let key = FlowKey::of(event, token);
        match phase {
            Phase::BeforeDay => {
                if self.flows.remove(&key).is_none() {
                    return Err(unknown_stop(key));
                }
            }
            Phase::DuringDay => match self.flows.get_mut(&key) {
                Some(flow) => flow.end = Some(event.timestamp),
                None => return Err(unknown_stop(key)),
            },
        }
        Ok(())
    }

    pub fn apply_update(&mut self, event: &FlowEvent, token: &TokenMetadata, phase: Phase) -> Result<()> {
        let key = FlowKey::of(event, token);
        let Some(flow) = self.flows.get_mut(&key) else {
            return Err(AccountingError::UnknownFlowUpdate {
                sender: key.sender,
                recipient: key.recipient,
                token: key.token_id,
            });
        };

        let previous = std::mem::replace(&mut flow.flow_rate, event.flow_rate.clone());
        if phase == Phase::DuringDay {
            flow.rate_changes.push(RateChange {
                timestamp: event.timestamp,
                previous_flow_rate: previous,
            });
        }
        Ok(())
    }

    /// Consume the ledger, yielding entries ordered by (start, key).
    pub fn into_flows(self) -> Vec<OpenFlow> {
        let mut entries: Vec<(FlowKey, OpenFlow)> = self.flows.into_iter().collect();
        entries.sort_by(|(ka, a), (kb, b)| a.start.cmp(&b.start).then_with(|| ka.cmp(kb)));
        entries.into_iter().map(|(_, flow)| flow).collect()
    }
}

fn unknown_stop(key: FlowKey) -> AccountingError {
    AccountingError::UnknownFlowStop {
        sender: key.sender,
        recipient: key.recipient,
        token: key.token_id,
    }
}
