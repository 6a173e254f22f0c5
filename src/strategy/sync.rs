//! Synchronous replay strategy
//!
//! Single-threaded pipeline: `SyncReader` streams commands one row at a time
//! straight into the deployment, then `write_accounts_csv` renders the final
//! account states. Memory use is bounded by the number of accounts and
//! records, not by the size of the input file.

use crate::config::CashierConfig;
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{bootstrap, execute_logged, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous replay strategy
///
/// ```no_run
/// use sharded_cashier::config::CashierConfig;
/// use sharded_cashier::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
///
/// let strategy = SyncProcessingStrategy::new(CashierConfig::default());
/// let mut output = std::io::stdout();
/// strategy.process(Path::new("commands.csv"), &mut output).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    config: CashierConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: CashierConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let mut deployment = bootstrap(&self.config)?;
        let reader = SyncReader::new(input_path, self.config.decimals)?;

        let mut applied = 0usize;
        let mut rejected = 0usize;
        for result in reader {
            match result {
                Ok(command) => {
                    if execute_logged(&mut deployment, command) {
                        applied += 1;
                    } else {
                        rejected += 1;
                    }
                }
                Err(e) => warn!(error = %e, "skipping command record"),
            }
        }
        info!(applied, rejected, "replay finished");

        write_accounts_csv(&deployment.accounts(), self.config.decimals, output)
    }
}
