//! Sharded cashier replay CLI
//!
//! Replays operator commands from a CSV file against a freshly bootstrapped
//! coordinator and prints the resulting account states to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > accounts.csv
//! cargo run -- --strategy async --batch-size 500 commands.csv > accounts.csv
//! cargo run -- --config cashier.yaml --shards 16 commands.csv > accounts.csv
//! RUST_LOG=sharded_cashier=debug cargo run -- commands.csv
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (invalid configuration, file not found, output failure, ...)

use sharded_cashier::cli;
use sharded_cashier::logging;
use sharded_cashier::strategy;
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();

    let config = match args.to_cashier_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    logging::init_logging(&config.log_level);

    let batch = matches!(args.strategy, cli::StrategyType::Async).then(|| args.to_batch_config());
    let strategy = strategy::create_strategy(args.strategy.clone(), config, batch);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
