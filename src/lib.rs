//! Swap Exchange Engine Library
//! # Overview
//!
//! The points and swap core of a clothing-exchange marketplace. Members list
//! garments, admins moderate them, and members acquire listed items either by
//! swapping one of their own or by spending points. A binary replays CSV
//! command logs through the core with a sync or async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (User, Item, Swap, LedgerEntry, Actor, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::store`] - In-memory tables and the version-checked unit of work
//!   - [`core::engine`] - Ledger Store operations and command routing
//!   - [`core::catalog`] - Item Registry
//!   - [`core::moderation`] - Admin approval with the upload bonus
//!   - [`core::swap_workflow`] - Swap requests and their state machine
//!   - [`core::redemption`] - Direct point redemption
//! - [`io`] - CSV command parsing and report output
//! - [`strategy`] - Replay pipelines
//!
//! # Points
//!
//! Every balance change is an immutable ledger entry recording the balance
//! before and after. The `points` field on a user is a projection of the
//! latest entry, written in the same commit:
//!
//! - **upload**: bonus credited when an admin approves a listing
//! - **swap**: both sides of a points swap, posted when the owner accepts
//! - **redeem**: debit for buying an item outright
//! - **admin_adjustment**: manual correction by an admin
//!
//! # Swap States
//!
//! `pending → accepted → completed`, or `pending → rejected`. Items in an
//! accepted swap are `reserved` until it completes.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{ExchangeConfig, ExchangeEngine, ExchangeStore};
pub use io::{write_report, ReportKind};
pub use types::{
    Actor, ExchangeError, Item, ItemId, ItemStatus, LedgerEntry, LedgerReason, Points, Swap,
    SwapId, SwapStatus, User, UserId,
};
