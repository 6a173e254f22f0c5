//! Replay strategy module
//!
//! A replay pipeline reads operator commands from a CSV file, executes them
//! against a freshly bootstrapped [`Deployment`] and writes the final account
//! states. The synchronous and asynchronous pipelines are interchangeable and
//! selected at runtime.

use crate::cli::StrategyType;
use crate::config::CashierConfig;
use crate::core::Deployment;
use crate::types::Command;
use std::io::Write;
use std::path::Path;
use tracing::warn;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Complete replay pipeline
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the commands in `input_path` and write account states to `output`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The deployment cannot be bootstrapped from the configuration
    /// - The input file cannot be opened
    /// - Output cannot be written
    ///
    /// Malformed rows and rejected commands are logged and skipped; they never
    /// abort the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a replay strategy
///
/// # Arguments
///
/// * `strategy_type` - Which pipeline to build
/// * `config` - Deployment and output settings
/// * `batch` - Batch settings for the async pipeline (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: CashierConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(config)),
        StrategyType::Async => {
            Box::new(AsyncProcessingStrategy::new(config, batch.unwrap_or_default()))
        }
    }
}

/// Bootstrap the deployment every pipeline replays against
fn bootstrap(config: &CashierConfig) -> Result<Deployment, String> {
    Deployment::from_config(config).map_err(|e| format!("Failed to bootstrap deployment: {}", e))
}

/// Execute one command, logging a rejection instead of propagating it
///
/// Returns whether the command was applied.
fn execute_logged(deployment: &mut Deployment, command: Command) -> bool {
    let kind = command.kind();
    let tx_id = command.tx_id();
    match deployment.execute(command) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                command = %kind,
                tx_id = %tx_id,
                category = %e.category(),
                error = %e,
                "command rejected"
            );
            false
        }
    }
}
