//! Core traits for shards and the coordinator's external collaborators
//!
//! The coordinator only ever talks to these abstractions. Every trait takes
//! `&self` and is `Send + Sync` so one implementation (a shard, a ledger) can be
//! shared between several coordinators through an `Arc`.

use crate::types::{
    Address, Amount, CashIn, CashInStatus, CashOut, CashOutFlag, CashOutStatus, Capability,
    HookError, HookIndex, LedgerError, ReleaseTime, ShardError, TxId,
};

/// Partition of the cash-in/cash-out record store
///
/// Record mutations are gated to an allow-list (owner plus co-administrators)
/// and report expected business conditions as a typed [`ShardError`] instead of
/// failing hard. Every mutation returns the record as it was *before* the call,
/// so the caller can report old values and undo the change.
pub trait Shard: Send + Sync {
    /// Identity of this shard
    fn address(&self) -> Address;

    /// Coordinator currently owning this shard
    fn owner(&self) -> Address;

    /// Whether `account` is a trusted co-administrator
    fn is_admin(&self, account: Address) -> bool;

    /// Version of the record-handling implementation
    fn implementation_version(&self) -> u32;

    /// Register a cash-in with the given target status
    ///
    /// Fails with `CashInAlreadyExecuted` if the identifier is in any status
    /// other than `Nonexistent`.
    fn register_cash_in(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
        target_status: CashInStatus,
    ) -> Result<CashIn, ShardError>;

    /// Revoke a premint cash-in, returning it to `Nonexistent` with a zero amount
    fn revoke_cash_in(&self, caller: Address, tx_id: TxId) -> Result<CashIn, ShardError>;

    /// Replace the amount of a premint cash-in
    fn update_cash_in(
        &self,
        caller: Address,
        tx_id: TxId,
        amount: Amount,
    ) -> Result<CashIn, ShardError>;

    /// Register a cash-out as `Pending`
    fn register_cash_out(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<CashOut, ShardError>;

    /// Register an atomic internal cash-out (status `Internal`)
    fn register_internal_cash_out(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<CashOut, ShardError>;

    /// Register an atomic forced cash-out (status `Forced`)
    fn register_forced_cash_out(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<CashOut, ShardError>;

    /// Move a `Pending` cash-out to `Confirmed` or `Reversed`
    fn process_cash_out(
        &self,
        caller: Address,
        tx_id: TxId,
        target_status: CashOutStatus,
    ) -> Result<CashOut, ShardError>;

    fn set_cash_out_flag(
        &self,
        caller: Address,
        tx_id: TxId,
        flag: CashOutFlag,
    ) -> Result<CashOut, ShardError>;

    fn reset_cash_out_flag(
        &self,
        caller: Address,
        tx_id: TxId,
        flag: CashOutFlag,
    ) -> Result<CashOut, ShardError>;

    /// Overwrite a cash-in record unconditionally (used to undo aborted operations)
    fn restore_cash_in(&self, caller: Address, tx_id: TxId, record: CashIn)
        -> Result<(), ShardError>;

    /// Overwrite a cash-out record unconditionally (used to undo aborted operations)
    fn restore_cash_out(
        &self,
        caller: Address,
        tx_id: TxId,
        record: CashOut,
    ) -> Result<(), ShardError>;

    fn get_cash_in(&self, tx_id: TxId) -> CashIn;

    fn get_cash_out(&self, tx_id: TxId) -> CashOut;

    /// Grant or withdraw co-administrator trust (owner only)
    fn set_admin(&self, caller: Address, account: Address, status: bool) -> Result<(), ShardError>;

    /// Hand the shard over to another coordinator (owner only)
    fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<(), ShardError>;

    /// Switch the record-handling implementation (owner only)
    fn upgrade_to(&self, caller: Address, version: u32) -> Result<(), ShardError>;
}

/// Role/permission service
pub trait PermissionService: Send + Sync {
    fn has_privilege(&self, caller: Address, capability: Capability) -> bool;
}

/// Suspend/resume circuit breaker
pub trait SuspendGate: Send + Sync {
    fn is_suspended(&self) -> bool;
}

/// Fungible balance ledger
pub trait FungibleLedger: Send + Sync {
    /// Issue new tokens to `account`
    ///
    /// # Returns
    ///
    /// `false` if the ledger refused to mint (a business failure, not fatal)
    fn issue(&self, account: Address, amount: Amount) -> bool;

    /// Permanently remove tokens from `account`
    fn remove(&self, account: Address, amount: Amount) -> Result<(), LedgerError>;

    fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<(), LedgerError>;

    fn balance_of(&self, account: Address) -> Amount;
}

/// Premint sub-ledger scheduling future issuance
pub trait PremintLedger: Send + Sync {
    fn schedule_increase(
        &self,
        account: Address,
        amount: Amount,
        release_time: ReleaseTime,
    ) -> Result<(), LedgerError>;

    fn schedule_decrease(
        &self,
        account: Address,
        amount: Amount,
        release_time: ReleaseTime,
    ) -> Result<(), LedgerError>;

    /// Recreate a schedule entry at a new amount
    ///
    /// The default implementation removes the old amount and schedules the new
    /// one, putting the old amount back if the second step fails.
    fn reschedule(
        &self,
        account: Address,
        old_amount: Amount,
        new_amount: Amount,
        release_time: ReleaseTime,
    ) -> Result<(), LedgerError> {
        self.schedule_decrease(account, old_amount, release_time)?;
        if let Err(e) = self.schedule_increase(account, new_amount, release_time) {
            self.schedule_increase(account, old_amount, release_time)?;
            return Err(e);
        }
        Ok(())
    }

    /// Amount currently scheduled for `account` at `release_time`
    fn scheduled(&self, account: Address, release_time: ReleaseTime) -> Amount;
}

/// Callable hook target
pub trait CashOutHook: Send + Sync {
    /// Single entry point invoked synchronously at a lifecycle point
    ///
    /// Returning an error vetoes the enclosing operation.
    fn on_cash_out_hook(&self, hook_index: HookIndex, tx_id: TxId) -> Result<(), HookError>;
}
