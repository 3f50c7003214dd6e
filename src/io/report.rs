//! Final report selection

use crate::core::engine::DEFAULT_LEADERBOARD_SIZE;
use crate::core::ExchangeEngine;
use crate::io::csv_format::{
    write_balances_csv, write_items_csv, write_leaderboard_csv, write_ledger_csv,
};
use crate::types::ExchangeError;
use clap::ValueEnum;
use std::io::Write;

/// Report printed once the replay finishes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Cached and ledger balance per user, with earned/spent totals
    #[default]
    Balances,
    /// Every ledger entry in creation order
    Ledger,
    /// Every listing with its status and counters
    Items,
    /// Top active users by balance
    Leaderboard,
}

/// Write the selected report for the engine's current state
///
/// # Errors
///
/// Returns `IoError` if the output cannot be written.
pub fn write_report(
    engine: &ExchangeEngine,
    kind: ReportKind,
    output: &mut dyn Write,
) -> Result<(), ExchangeError> {
    match kind {
        ReportKind::Balances => {
            let summaries = engine
                .users()
                .iter()
                .map(|user| engine.points_summary(user.id))
                .collect::<Result<Vec<_>, _>>()?;
            write_balances_csv(&summaries, output)
        }
        ReportKind::Ledger => write_ledger_csv(&engine.ledger_entries(), output),
        ReportKind::Items => write_items_csv(&engine.items(), output),
        ReportKind::Leaderboard => {
            write_leaderboard_csv(&engine.top_users(DEFAULT_LEADERBOARD_SIZE), output)
        }
    }
}
