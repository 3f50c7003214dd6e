//! Core business logic module
//!
//! This module contains the marketplace core:
//! - `traits` - Clock and record abstractions shared by the tables
//! - `table` / `ledger_store` / `store` - Storage and the unit of work
//! - `engine` - The engine handle, Ledger Store operations and command routing
//! - `catalog` - Item Registry operations
//! - `moderation` - The admin approve/reject gateway
//! - `swap_workflow` - Swap requests and their state machine
//! - `redemption` - Direct redemption and the shared points-purchase checks

pub mod catalog;
pub mod config;
pub mod engine;
pub mod ledger_store;
pub mod moderation;
pub mod redemption;
pub mod store;
pub mod swap_workflow;
pub mod table;
pub mod traits;

#[cfg(test)]
pub(crate) mod testkit;

pub use config::ExchangeConfig;
pub use engine::{AdminOverview, BalanceMismatch, ExchangeEngine, PointsSummary};
pub use ledger_store::LedgerStore;
pub use store::{CommitReceipt, ExchangeStore, ItemRegistry, SwapStore, UnitOfWork, UserStore};
pub use table::Table;
pub use traits::{Clock, Record, SystemClock};
