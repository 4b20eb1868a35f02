//! Daily per-address accounting of token transfers and payment streams.
//!
//! The engine (`integrator`, `ledger`, `flows`, `transfers`) is pure: it takes
//! pre-sorted token events and a day boundary and returns that day's records.
//! The remaining modules fetch events, run the engine once per address per
//! day, store the results and serve them over HTTP.

pub mod api;
pub mod config;
pub mod day;
pub mod db;
pub mod error;
pub mod explorer;
pub mod flows;
pub mod grades;
pub mod integrator;
pub mod job;
pub mod ledger;
pub mod models;
pub mod subgraph;
pub mod transfers;

pub use error::AccountingError;
pub use flows::compute_daily_flows;
pub use transfers::compute_daily_transfers;
