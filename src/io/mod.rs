//! I/O module
//!
//! Handles CSV parsing of replayed commands and report output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, report serialization)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `report` - Selects and writes the report the binary prints

pub mod async_reader;
pub mod csv_format;
pub mod report;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_csv_command, write_balances_csv, write_items_csv, write_leaderboard_csv,
    write_ledger_csv, CsvCommand,
};
pub use report::{write_report, ReportKind};
pub use sync_reader::SyncReader;
