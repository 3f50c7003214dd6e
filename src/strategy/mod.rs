//! Replay strategy module
//!
//! A strategy is a complete replay pipeline: read the command log, apply
//! every command to a fresh engine in file order, then write the selected
//! report. Strategies differ only in how they read, so both produce the
//! same report for the same input.

use crate::cli::StrategyType;
use crate::core::ExchangeConfig;
use crate::io::ReportKind;
use crate::types::ExchangeError;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Replay pipeline from a CSV command log to a CSV report
pub trait ProcessingStrategy: Send + Sync {
    /// Replay `input_path` and write `report` to `output`
    ///
    /// Commands that fail to parse or are refused by the engine are logged
    /// with `warn!` and skipped; replay continues with the next row.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened or read
    /// - The async runtime cannot be started
    /// - The report cannot be written
    fn process(
        &self,
        input_path: &Path,
        report: ReportKind,
        output: &mut dyn Write,
    ) -> Result<(), ExchangeError>;
}

/// Create a replay strategy
///
/// # Arguments
///
/// * `strategy_type` - Which reader to use
/// * `exchange` - Engine configuration for the replay
/// * `batch` - Batching configuration (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    exchange: ExchangeConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(exchange)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            exchange,
            batch.unwrap_or_default(),
        )),
    }
}
