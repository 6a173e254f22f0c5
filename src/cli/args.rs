use crate::config::CashierConfig;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay cash-in / cash-out commands against a sharded cashier
#[derive(Parser, Debug)]
#[command(name = "sharded-cashier")]
#[command(about = "Replay cash-in / cash-out commands against a sharded cashier", long_about = None)]
pub struct CliArgs {
    /// Input CSV file containing operator commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for synchronous or 'async' for the batched actor pipeline"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (async mode only, default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Batches buffered ahead of execution and worker threads (async mode only, default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "config",
        value_name = "FILE",
        help = "YAML configuration file (coordinator, operator, shard_count, max_shard_count, decimals, log_level)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long = "shards", value_name = "COUNT", help = "Number of shards to create (overrides the config file)")]
    pub shards: Option<usize>,

    #[arg(
        long = "decimals",
        value_name = "DIGITS",
        help = "Fractional digits of CSV amounts (overrides the config file)"
    )]
    pub decimals: Option<u32>,
}

/// Available replay strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Values not given on the command line (or given as zero) fall back to
    /// the defaults.
    pub fn to_batch_config(&self) -> BatchConfig {
        let default = BatchConfig::default();
        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent_batches
                .unwrap_or(default.max_concurrent_batches),
        )
    }

    /// Build the effective configuration
    ///
    /// Starts from the `--config` file (or the defaults), applies command line
    /// overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns a message if the file cannot be loaded or the resulting
    /// configuration is invalid.
    pub fn to_cashier_config(&self) -> Result<CashierConfig, String> {
        let mut config = match &self.config {
            Some(path) => CashierConfig::load(path)?,
            None => CashierConfig::default(),
        };
        if let Some(shards) = self.shards {
            config.shard_count = shards;
        }
        if let Some(decimals) = self.decimals {
            config.decimals = decimals;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_falls_back(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_cashier_config_defaults() {
        let parsed = CliArgs::try_parse_from(["program", "input.csv"]).unwrap();
        assert_eq!(parsed.to_cashier_config().unwrap(), CashierConfig::default());
    }

    #[test]
    fn test_command_line_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"shard_count: 8\ndecimals: 6\n").unwrap();
        file.flush().unwrap();
        let path = file.path().to_str().unwrap();

        let parsed =
            CliArgs::try_parse_from(["program", "--config", path, "--shards", "3", "input.csv"]).unwrap();
        let config = parsed.to_cashier_config().unwrap();
        assert_eq!(config.shard_count, 3);
        assert_eq!(config.decimals, 6);
    }

    #[rstest]
    #[case::zero_shards(&["program", "--shards", "0", "input.csv"])]
    #[case::too_precise(&["program", "--decimals", "30", "input.csv"])]
    #[case::missing_config(&["program", "--config", "missing.yaml", "input.csv"])]
    fn test_invalid_cashier_config(#[case] args: &[&str]) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert!(parsed.to_cashier_config().is_err());
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::negative_shards(&["program", "--shards", "-1", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
