//! Error types for the sharded cashier
//!
//! This module defines every error that can cross a component boundary.
//!
//! # Error Categories
//!
//! - **Validation**: zero identifiers/accounts/amounts, malformed batches, invalid
//!   hook configuration. Always rejected before any state is touched.
//! - **Authorization / Availability**: missing capability, suspended coordinator.
//! - **Business state**: already executed cash-ins, inappropriate status or
//!   account, carrying the offending current value.
//! - **Collaborator**: ledger and hook failures, possibly transient.
//! - **Shard protocol**: a shard returned a result code the coordinator does not
//!   know. Fatal; signals a version mismatch and must not be retried.

use super::access::Capability;
use super::cash_in::CashInStatus;
use super::cash_out::CashOutStatus;
use super::hook::HookIndex;
use super::ids::{Address, Amount, BatchId, ReleaseTime, TxId};
use std::fmt;
use thiserror::Error;

/// Typed result code returned by a shard for an expected business condition
///
/// Success is `Ok(..)`; every variant here is an outcome the coordinator must
/// interpret. Each variant has a stable numeric [`code`](ShardError::code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShardError {
    #[error("caller {caller} is not authorized on the shard")]
    Unauthorized { caller: Address },

    #[error("cash-in already executed")]
    CashInAlreadyExecuted,

    #[error("cash-in status is {0}")]
    CashInStatusInappropriate(CashInStatus),

    #[error("cash-out status is {0}")]
    CashOutStatusInappropriate(CashOutStatus),

    #[error("cash-out is pinned to account {0}")]
    CashOutAccountInappropriate(Address),

    /// A code outside the known set, reported by a foreign or newer shard
    #[error("unrecognized shard result code {code}")]
    Unrecognized { code: u16 },
}

impl ShardError {
    /// Stable numeric result code (0 is reserved for success)
    pub fn code(&self) -> u16 {
        match self {
            ShardError::Unauthorized { .. } => 1,
            ShardError::CashInAlreadyExecuted => 2,
            ShardError::CashInStatusInappropriate(_) => 3,
            ShardError::CashOutStatusInappropriate(_) => 4,
            ShardError::CashOutAccountInappropriate(_) => 5,
            ShardError::Unrecognized { code } => *code,
        }
    }
}

/// Failure reported by the fungible ledger collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient balance for {account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        requested: Amount,
    },

    #[error("Balance overflow for {account}")]
    BalanceOverflow { account: Address },

    #[error(
        "Insufficient premint for {account} at release time {release_time}: scheduled {scheduled}, requested {requested}"
    )]
    PremintInsufficient {
        account: Address,
        release_time: ReleaseTime,
        scheduled: Amount,
        requested: Amount,
    },

    #[error("Premint overflow for {account} at release time {release_time}")]
    PremintOverflow {
        account: Address,
        release_time: ReleaseTime,
    },
}

/// Failure reported by a hook target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("hook rejected the transition: {reason}")]
    Rejected { reason: String },
}

impl HookError {
    pub fn rejected(reason: &str) -> Self {
        HookError::Rejected {
            reason: reason.to_string(),
        }
    }
}

/// Classification of a [`CashierError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Authorization,
    Availability,
    BusinessState,
    Collaborator,
    ShardProtocol,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Availability => "availability",
            ErrorCategory::BusinessState => "business_state",
            ErrorCategory::Collaborator => "collaborator",
            ErrorCategory::ShardProtocol => "shard_protocol",
        };
        f.write_str(name)
    }
}

/// Main error type of the coordinator
///
/// Every error aborts the whole operation; nothing is recovered locally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CashierError {
    // === Validation ===
    #[error("Account address is zero")]
    AccountAddressZero,

    #[error("Amount is zero")]
    AmountZero,

    #[error("Amount {amount} exceeds the 64-bit ceiling")]
    AmountExcess { amount: u128 },

    #[error("Transaction id is zero")]
    TxIdZero,

    #[error("Batch id is zero")]
    BatchIdZero,

    #[error("Premint release time is zero")]
    ReleaseTimeZero,

    #[error("Input arrays are empty")]
    InputArraysEmpty,

    #[error("Input array lengths mismatch: {accounts} accounts, {amounts} amounts, {tx_ids} tx ids")]
    InputArraysLengthMismatch {
        accounts: usize,
        amounts: usize,
        tx_ids: usize,
    },

    #[error("Hook flags {bits:#06x} use bits outside indices 6..=11")]
    HookFlagsInvalid { bits: u16 },

    #[error("Hook target address is zero while hook flags are set")]
    HookTargetAddressZero,

    #[error("Hook target address is set while hook flags are empty")]
    HookTargetAddressNonZero,

    #[error("Hooks for transaction {tx_id} are already configured with the same target and flags")]
    HooksAlreadyRegistered { tx_id: TxId },

    #[error("Shard count {requested} exceeds the maximum of {max}")]
    ShardCountExcess { requested: usize, max: usize },

    #[error("Shard replacement of {count} shards at index {start} exceeds the registry length {len}")]
    ShardReplacementOutOfBounds {
        start: usize,
        count: usize,
        len: usize,
    },

    // === Authorization / availability ===
    #[error("Caller {caller} lacks the {capability} capability")]
    Unauthorized {
        caller: Address,
        capability: Capability,
    },

    #[error("Shard rejected caller {caller}")]
    ShardUnauthorized { caller: Address },

    #[error("Cashier is temporarily unavailable (suspended)")]
    Suspended,

    // === Business state ===
    #[error("No shards are registered")]
    ShardCountZero,

    #[error("Cash-in {tx_id} is already executed")]
    CashInAlreadyExecuted { tx_id: TxId },

    #[error("Cash-in batch {batch_id} is already executed")]
    CashInBatchAlreadyExecuted { batch_id: BatchId },

    #[error("Cash-in {tx_id} has inappropriate status {status}")]
    CashInStatusInappropriate { tx_id: TxId, status: CashInStatus },

    #[error("Cash-out {tx_id} has inappropriate status {status}")]
    CashOutStatusInappropriate { tx_id: TxId, status: CashOutStatus },

    #[error("Cash-out {tx_id} is bound to account {expected}")]
    CashOutAccountInappropriate { tx_id: TxId, expected: Address },

    // === Collaborator ===
    #[error("Token minting failed for {account} (amount {amount})")]
    TokenMintingFailure { account: Address, amount: Amount },

    #[error("Ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Hook {hook_index} of target {target} failed for {tx_id}: {source}")]
    HookFailed {
        tx_id: TxId,
        hook_index: HookIndex,
        target: Address,
        #[source]
        source: HookError,
    },

    #[error("Hook target {target} is not registered")]
    HookTargetUnregistered { target: Address },

    // === Shard protocol ===
    #[error("Shard returned unexpected result code {code}")]
    ShardErrorUnexpected { code: u16 },
}

impl CashierError {
    /// Translate a shard result code into a caller-facing error
    pub fn shard(tx_id: TxId, error: ShardError) -> Self {
        match error {
            ShardError::Unauthorized { caller } => CashierError::ShardUnauthorized { caller },
            ShardError::CashInAlreadyExecuted => CashierError::CashInAlreadyExecuted { tx_id },
            ShardError::CashInStatusInappropriate(status) => {
                CashierError::CashInStatusInappropriate { tx_id, status }
            }
            ShardError::CashOutStatusInappropriate(status) => {
                CashierError::CashOutStatusInappropriate { tx_id, status }
            }
            ShardError::CashOutAccountInappropriate(expected) => {
                CashierError::CashOutAccountInappropriate { tx_id, expected }
            }
            ShardError::Unrecognized { code } => CashierError::ShardErrorUnexpected { code },
        }
    }

    /// Translate a shard result code returned by an administration call
    pub fn shard_admin(error: ShardError) -> Self {
        match error {
            ShardError::Unauthorized { caller } => CashierError::ShardUnauthorized { caller },
            other => CashierError::ShardErrorUnexpected { code: other.code() },
        }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(caller: Address, capability: Capability) -> Self {
        CashierError::Unauthorized { caller, capability }
    }

    /// Create an InputArraysLengthMismatch error
    pub fn length_mismatch(accounts: usize, amounts: usize, tx_ids: usize) -> Self {
        CashierError::InputArraysLengthMismatch {
            accounts,
            amounts,
            tx_ids,
        }
    }

    /// Create a HookFailed error
    pub fn hook_failed(tx_id: TxId, hook_index: HookIndex, target: Address, source: HookError) -> Self {
        CashierError::HookFailed {
            tx_id,
            hook_index,
            target,
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CashierError::AccountAddressZero
            | CashierError::AmountZero
            | CashierError::AmountExcess { .. }
            | CashierError::TxIdZero
            | CashierError::BatchIdZero
            | CashierError::ReleaseTimeZero
            | CashierError::InputArraysEmpty
            | CashierError::InputArraysLengthMismatch { .. }
            | CashierError::HookFlagsInvalid { .. }
            | CashierError::HookTargetAddressZero
            | CashierError::HookTargetAddressNonZero
            | CashierError::HooksAlreadyRegistered { .. }
            | CashierError::ShardCountExcess { .. }
            | CashierError::ShardReplacementOutOfBounds { .. } => ErrorCategory::Validation,

            CashierError::Unauthorized { .. } | CashierError::ShardUnauthorized { .. } => {
                ErrorCategory::Authorization
            }

            CashierError::Suspended => ErrorCategory::Availability,

            CashierError::ShardCountZero
            | CashierError::CashInAlreadyExecuted { .. }
            | CashierError::CashInBatchAlreadyExecuted { .. }
            | CashierError::CashInStatusInappropriate { .. }
            | CashierError::CashOutStatusInappropriate { .. }
            | CashierError::CashOutAccountInappropriate { .. } => ErrorCategory::BusinessState,

            CashierError::TokenMintingFailure { .. }
            | CashierError::Ledger(_)
            | CashierError::HookFailed { .. }
            | CashierError::HookTargetUnregistered { .. } => ErrorCategory::Collaborator,

            CashierError::ShardErrorUnexpected { .. } => ErrorCategory::ShardProtocol,
        }
    }

    /// Whether resubmitting the same operation later may succeed
    ///
    /// Shard protocol errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Availability | ErrorCategory::Collaborator
        )
    }
}

/// Check that a raw amount fits the 64-bit ceiling and is not zero
pub fn checked_amount(raw: u128) -> Result<Amount, CashierError> {
    if raw == 0 {
        return Err(CashierError::AmountZero);
    }
    Amount::try_from(raw).map_err(|_| CashierError::AmountExcess { amount: raw })
}
