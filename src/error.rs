// src/error.rs
use thiserror::Error;

/// Errors raised while replaying a holding's events. Any of them aborts the whole call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingError {
    #[error("duplicate flow ({sender}, {recipient}, {token}): start seen while the stream is open")]
    DuplicateFlowStart {
        sender: String,
        recipient: String,
        token: String,
    },

    #[error("flow-stop event triggered on non-existent flow ({sender}, {recipient}, {token})")]
    UnknownFlowStop {
        sender: String,
        recipient: String,
        token: String,
    },

    #[error("flow-update event triggered on non-existent flow ({sender}, {recipient}, {token})")]
    UnknownFlowUpdate {
        sender: String,
        recipient: String,
        token: String,
    },

    #[error("flow event {id} has both old and new flow rate at zero")]
    InvalidFlowEvent { id: String },

    #[error("events for token {token} are not in timestamp order (at {id})")]
    UnorderedEvents { token: String, id: String },

    #[error("invalid base-unit amount: {value:?}")]
    InvalidAmount { value: String },
}

pub type Result<T> = std::result::Result<T, AccountingError>;
