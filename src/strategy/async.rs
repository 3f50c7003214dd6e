//! Asynchronous batch replay strategy
//!
//! A reader task spawned on the runtime's worker threads parses the command
//! log in batches with csv-async and sends them over a bounded channel. The
//! replay loop on the calling thread applies each batch in file order while
//! the reader parses the next one. Commands are never applied out of order,
//! since swap and ledger state depend on it, so `worker_threads` only sizes
//! the pool the reader runs on.

use crate::core::{ExchangeConfig, ExchangeEngine};
use crate::io::{write_report, AsyncReader, ReportKind};
use crate::strategy::sync::replay;
use crate::strategy::ProcessingStrategy;
use crate::types::{CommandRecord, ExchangeError};
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Batches read ahead of the replay loop
const READ_AHEAD: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub worker_threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            worker_threads: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Zero values fall back to the defaults with a warning
    pub fn new(batch_size: usize, worker_threads: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let worker_threads = if worker_threads == 0 {
            warn!(
                worker_threads,
                default = default.worker_threads,
                "invalid worker thread count, using default"
            );
            default.worker_threads
        } else {
            worker_threads
        };

        Self {
            batch_size,
            worker_threads,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    exchange: ExchangeConfig,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(exchange: ExchangeConfig, config: BatchConfig) -> Self {
        Self { exchange, config }
    }

    async fn replay_file(&self, input_path: &Path) -> Result<ExchangeEngine, ExchangeError> {
        let file = tokio::fs::File::open(input_path)
            .await
            .map_err(|e| ExchangeError::IoError {
                message: format!("failed to open file '{}': {}", input_path.display(), e),
            })?;
        let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
        let mut reader = AsyncReader::new(compat_file);

        let (sender, mut receiver) = mpsc::channel::<Vec<CommandRecord>>(READ_AHEAD);
        let batch_size = self.config.batch_size;
        let reader_task = tokio::spawn(async move {
            loop {
                let batch = reader.read_batch(batch_size).await?;
                if batch.is_empty() || sender.send(batch).await.is_err() {
                    return Ok::<(), ExchangeError>(());
                }
            }
        });

        let engine = ExchangeEngine::new(self.exchange);
        while let Some(batch) = receiver.recv().await {
            debug!(commands = batch.len(), "replaying batch");
            for record in batch {
                replay(&engine, record);
            }
        }

        reader_task.await.map_err(|e| ExchangeError::IoError {
            message: format!("reader task failed: {e}"),
        })??;
        Ok(engine)
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        input_path: &Path,
        report: ReportKind,
        output: &mut dyn Write,
    ) -> Result<(), ExchangeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .build()
            .map_err(|e| ExchangeError::IoError {
                message: format!("failed to create tokio runtime: {e}"),
            })?;

        let engine = runtime.block_on(self.replay_file(input_path))?;
        write_report(&engine, report, output)
    }
}
