//! Replay configuration
//!
//! Values come from an optional YAML file in which every field may be
//! omitted. Command line flags are applied on top by the binary.

use crate::core::router::MAX_SHARD_COUNT;
use crate::types::Address;
use serde::Deserialize;
use std::path::Path;

/// Largest number of fractional digits accepted for CSV amounts
pub const MAX_DECIMALS: u32 = 18;

/// Deployment and output settings for a replay run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CashierConfig {
    /// Coordinator identity; also the escrow account for pending cash-outs
    pub coordinator: Address,

    /// Account every replayed command is executed as
    pub operator: Address,

    /// Number of shards created at start-up
    pub shard_count: usize,

    pub max_shard_count: usize,

    /// Fractional digits of CSV amounts (`1.25` with 2 decimals is 125 base units)
    pub decimals: u32,

    /// Fallback filter when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for CashierConfig {
    fn default() -> Self {
        Self {
            coordinator: Address::from(0xc0de),
            operator: Address::from(0x0b),
            shard_count: 4,
            max_shard_count: MAX_SHARD_COUNT,
            decimals: 2,
            log_level: "warn".to_string(),
        }
    }
}

impl CashierConfig {
    /// Read a configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns a message if the file cannot be read or is not valid YAML for
    /// this structure (unknown keys are rejected).
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config '{}': {}", path.display(), e))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| format!("Invalid config '{}': {}", path.display(), e))
    }

    /// Check the values that the type system cannot
    pub fn validate(&self) -> Result<(), String> {
        if self.shard_count == 0 {
            return Err("shard_count must be at least 1".to_string());
        }
        if self.shard_count > self.max_shard_count {
            return Err(format!(
                "shard_count {} exceeds max_shard_count {}",
                self.shard_count, self.max_shard_count
            ));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(format!(
                "decimals {} exceeds the maximum of {}",
                self.decimals, MAX_DECIMALS
            ));
        }
        if self.coordinator.is_zero() || self.operator.is_zero() {
            return Err("coordinator and operator addresses must be non-zero".to_string());
        }
        if self.coordinator == self.operator {
            return Err("operator must differ from the coordinator".to_string());
        }
        Ok(())
    }
}
