use crate::core::ExchangeConfig;
use crate::io::ReportKind;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for the exchange replay binary
#[derive(Parser, Debug)]
#[command(name = "swap-exchange")]
#[command(
    about = "Replay a clothing-exchange command log and print the resulting state",
    long_about = None
)]
pub struct CliArgs {
    #[arg(value_name = "INPUT", help = "Path to the input CSV command log")]
    pub input_file: PathBuf,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Replay strategy: 'sync' for synchronous or 'async' for batched asynchronous reading"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "report",
        value_name = "REPORT",
        default_value = "balances",
        help = "Report to print: balances, ledger, items or leaderboard"
    )]
    pub report: ReportKind,

    #[arg(
        long = "points-per-upload",
        value_name = "POINTS",
        env = "POINTS_PER_UPLOAD",
        default_value_t = ExchangeConfig::DEFAULT_POINTS_PER_UPLOAD,
        help = "Points credited to an uploader when a listing is approved"
    )]
    pub points_per_upload: u64,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Commands per batch for the async strategy (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "worker-threads",
        value_name = "COUNT",
        help = "Worker threads the async strategy parses input on; commands still apply in file order (default: CPU cores)"
    )]
    pub worker_threads: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    pub fn to_exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig::new(self.points_per_upload)
    }

    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.worker_threads.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.worker_threads.unwrap_or(default.worker_threads),
            )
        } else {
            BatchConfig::default()
        }
    }
}
