//! Cash-in types
//!
//! A cash-in record is keyed by its off-chain transaction identifier and is
//! never deleted, only transitioned between statuses.

use super::ids::{Address, Amount};
use std::fmt;

/// Status of a cash-in record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CashInStatus {
    /// No cash-in has been executed for the identifier (or it was revoked)
    #[default]
    Nonexistent = 0,

    /// Tokens were issued to the beneficiary immediately
    Executed = 1,

    /// Issuance was scheduled on the premint sub-ledger
    PremintExecuted = 2,
}

impl CashInStatus {
    /// Human-readable status name
    pub fn as_str(&self) -> &'static str {
        match self {
            CashInStatus::Nonexistent => "nonexistent",
            CashInStatus::Executed => "executed",
            CashInStatus::PremintExecuted => "premint_executed",
        }
    }
}

impl fmt::Display for CashInStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cash-in record as stored by a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CashIn {
    /// Beneficiary of the issuance
    pub account: Address,

    /// Issued (or scheduled) amount
    pub amount: Amount,

    /// Current status
    pub status: CashInStatus,
}

/// Per-item outcome of a cash-in batch
///
/// Items that were already executed are tolerated and reported instead of
/// aborting the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CashInExecutionResult {
    Success = 0,
    AlreadyExecuted = 1,
}
