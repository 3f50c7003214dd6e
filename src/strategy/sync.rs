//! Synchronous replay strategy
//!
//! Reads the command log row by row with [`SyncReader`] and applies each
//! command to the engine on the calling thread.

use crate::core::{ExchangeConfig, ExchangeEngine};
use crate::io::{write_report, ReportKind, SyncReader};
use crate::strategy::ProcessingStrategy;
use crate::types::{CommandRecord, ExchangeError};
use std::io::Write;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProcessingStrategy {
    config: ExchangeConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: ExchangeConfig) -> Self {
        Self { config }
    }
}

/// Apply one command, logging a refusal instead of failing the replay
pub(crate) fn replay(engine: &ExchangeEngine, record: CommandRecord) {
    let op = record.command.name();
    if let Err(error) = engine.process(record) {
        warn!(op, kind = ?error.kind(), %error, "command skipped");
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        input_path: &Path,
        report: ReportKind,
        output: &mut dyn Write,
    ) -> Result<(), ExchangeError> {
        let engine = ExchangeEngine::new(self.config);
        let reader = SyncReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(record) => replay(&engine, record),
                Err(error @ ExchangeError::IoError { .. }) => return Err(error),
                Err(error) => warn!(%error, "skipping unreadable row"),
            }
        }

        write_report(&engine, report, output)
    }
}
