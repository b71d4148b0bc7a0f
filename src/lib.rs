//! Folio - investment position ledger and portfolio valuation
//!
//! This library maintains per-holding cost basis, realized and unrealized
//! gains and dividend income, aggregates active holdings into a portfolio
//! summary, and records append-only portfolio snapshots.

pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod importers;
pub mod ledger;
pub mod portfolio;
pub mod service;
pub mod utils;

pub use error::{LedgerError, Result};
pub use service::{LedgerService, PriceQuote, PriceUpdateOutcome};
