//! Swap Exchange CLI
//!
//! Replays a CSV command log through the exchange core and prints a report.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > balances.csv
//! cargo run -- --report ledger commands.csv > ledger.csv
//! cargo run -- --strategy async --batch-size 2000 --worker-threads 4 commands.csv
//! POINTS_PER_UPLOAD=25 RUST_LOG=info cargo run -- --report items commands.csv
//! ```
//!
//! Skipped commands are logged to stderr at `warn`; set `RUST_LOG` for more.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, file not readable, output not writable)

use std::process;
use swap_exchange_engine::cli;
use swap_exchange_engine::strategy;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = cli::parse_args();

    let strategy = {
        let batch = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, args.to_exchange_config(), batch)
    };

    let mut output = std::io::stdout().lock();
    if let Err(e) = strategy.process(&args.input_file, args.report, &mut output) {
        error!(error = %e, "replay failed");
        process::exit(1);
    }
}
