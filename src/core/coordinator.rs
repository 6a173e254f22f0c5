//! Cash-in / cash-out coordinator
//!
//! This module provides the `Coordinator` that validates caller requests, routes
//! them to the responsible shard, interprets the shard's result code, tracks
//! pending cash-outs, fires hooks around every transition and moves value
//! through the ledger collaborator.
//!
//! The coordinator enforces:
//! - Check order: suspend gate, then capability, then input shape, then routing
//! - Identity pinning of cash-out accounts (delegated to the shard)
//! - Fail-closed hooks: a vetoing hook aborts the whole operation
//! - All-or-nothing execution: every mutating operation runs inside
//!   [`Coordinator::atomically`], which undoes partial effects on error
//!
//! # Escrow
//!
//! Requested cash-outs are escrowed on the coordinator's own ledger account
//! (its [`address`](Coordinator::address)). Confirmation burns the escrow,
//! reversal returns it to the pinned account.

use crate::core::hooks::HookDispatcher;
use crate::core::journal::{Journal, LedgerUndo, UndoEntry};
use crate::core::pending_set::PendingSet;
use crate::core::router::ShardRouter;
use crate::core::traits::{
    CashOutHook, FungibleLedger, PermissionService, PremintLedger, Shard, SuspendGate,
};
use crate::types::{
    Address, Amount, BatchId, Capability, CashIn, CashInExecutionResult, CashInStatus, CashOut,
    CashOutFlag, CashOutStatus, CashierError, CashierEvent, HookConfig, HookFlags, HookIndex,
    LedgerError, ReleaseTime, ShardError, TxId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// External services the coordinator depends on
#[derive(Clone)]
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionService>,
    pub suspend_gate: Arc<dyn SuspendGate>,
    pub ledger: Arc<dyn FungibleLedger>,
    pub premint: Arc<dyn PremintLedger>,
}

/// Root component of the cashier
pub struct Coordinator {
    /// Identity used towards shards and as the escrow account
    address: Address,
    router: ShardRouter,
    pending: PendingSet,
    hooks: HookDispatcher,
    /// Outstanding (pending) cash-out amount per account
    cash_out_balances: HashMap<Address, Amount>,
    executed_batches: HashSet<BatchId>,
    events: Vec<CashierEvent>,
    collaborators: Collaborators,
}

impl Coordinator {
    /// Create a coordinator with an empty shard registry
    ///
    /// # Arguments
    ///
    /// * `address` - Identity of the coordinator (shard owner, escrow account)
    /// * `collaborators` - Permission, suspend and ledger services
    /// * `max_shard_count` - Upper bound on the shard registry
    pub fn new(address: Address, collaborators: Collaborators, max_shard_count: usize) -> Self {
        Self {
            address,
            router: ShardRouter::new(max_shard_count),
            pending: PendingSet::new(),
            hooks: HookDispatcher::new(),
            cash_out_balances: HashMap::new(),
            executed_batches: HashSet::new(),
            events: Vec::new(),
            collaborators,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    // ------------------------------------------------------------------
    // Cash-in
    // ------------------------------------------------------------------

    /// Execute a cash-in: record it as `Executed` and issue tokens to `account`
    ///
    /// # Errors
    ///
    /// * `CashInAlreadyExecuted` - the identifier was used before
    /// * `TokenMintingFailure` - the ledger refused to issue
    pub fn cash_in(
        &mut self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_cash_in(account, amount, tx_id)?;

        self.atomically("cash_in", |this, journal| {
            let shard = this.shard_for(&tx_id)?;
            let previous = shard
                .register_cash_in(this.address, account, amount, tx_id, CashInStatus::Executed)
                .map_err(|e| CashierError::shard(tx_id, e))?;
            journal.record(UndoEntry::CashIn {
                shard,
                tx_id,
                previous,
            });
            this.issue(journal, account, amount)?;
            this.emit(CashierEvent::CashIn {
                account,
                amount,
                tx_id,
            });
            Ok(())
        })
    }

    /// Execute a batch of cash-ins under one correlation identifier
    ///
    /// Items whose identifier was already executed are reported as
    /// `AlreadyExecuted` and skipped; any other failure aborts the whole batch.
    ///
    /// # Returns
    ///
    /// Per-item outcomes in input order
    pub fn cash_in_batch(
        &mut self,
        caller: Address,
        accounts: &[Address],
        amounts: &[Amount],
        tx_ids: &[TxId],
        batch_id: BatchId,
    ) -> Result<Vec<CashInExecutionResult>, CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_batch_shape(accounts.len(), amounts.len(), tx_ids.len())?;
        if batch_id.is_zero() {
            return Err(CashierError::BatchIdZero);
        }
        for ((account, amount), tx_id) in accounts.iter().zip(amounts).zip(tx_ids) {
            validate_cash_in(*account, *amount, *tx_id)?;
        }
        if self.executed_batches.contains(&batch_id) {
            return Err(CashierError::CashInBatchAlreadyExecuted { batch_id });
        }

        self.atomically("cash_in_batch", |this, journal| {
            let mut outcomes = Vec::with_capacity(tx_ids.len());
            for ((&account, &amount), &tx_id) in accounts.iter().zip(amounts).zip(tx_ids) {
                let shard = this.shard_for(&tx_id)?;
                let registered = shard.register_cash_in(
                    this.address,
                    account,
                    amount,
                    tx_id,
                    CashInStatus::Executed,
                );
                let previous = match registered {
                    Ok(previous) => previous,
                    Err(ShardError::CashInAlreadyExecuted) => {
                        debug!(tx_id = %tx_id, batch_id = %batch_id, "batch item already executed");
                        outcomes.push(CashInExecutionResult::AlreadyExecuted);
                        continue;
                    }
                    Err(e) => return Err(CashierError::shard(tx_id, e)),
                };
                journal.record(UndoEntry::CashIn {
                    shard,
                    tx_id,
                    previous,
                });
                this.issue(journal, account, amount)?;
                this.emit(CashierEvent::CashIn {
                    account,
                    amount,
                    tx_id,
                });
                outcomes.push(CashInExecutionResult::Success);
            }

            this.executed_batches.insert(batch_id);
            journal.record(UndoEntry::BatchMarked(batch_id));
            this.emit(CashierEvent::CashInBatch {
                batch_id,
                tx_ids: tx_ids.to_vec(),
                outcomes: outcomes.clone(),
            });
            Ok(outcomes)
        })
    }

    /// Execute a premint cash-in: schedule issuance at `release_time`
    pub fn cash_in_premint(
        &mut self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
        release_time: ReleaseTime,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_cash_in(account, amount, tx_id)?;
        validate_release_time(release_time)?;

        self.atomically("cash_in_premint", |this, journal| {
            let shard = this.shard_for(&tx_id)?;
            let previous = shard
                .register_cash_in(
                    this.address,
                    account,
                    amount,
                    tx_id,
                    CashInStatus::PremintExecuted,
                )
                .map_err(|e| CashierError::shard(tx_id, e))?;
            journal.record(UndoEntry::CashIn {
                shard,
                tx_id,
                previous,
            });

            this.collaborators
                .premint
                .schedule_increase(account, amount, release_time)?;
            journal.record(UndoEntry::Ledger(LedgerUndo::PremintIncreased {
                account,
                amount,
                release_time,
            }));

            this.emit(CashierEvent::CashInPremint {
                account,
                new_amount: amount,
                old_amount: 0,
                tx_id,
                release_time,
            });
            Ok(())
        })
    }

    /// Revoke a premint cash-in and cancel its scheduled issuance
    pub fn cash_in_premint_revoke(
        &mut self,
        caller: Address,
        tx_id: TxId,
        release_time: ReleaseTime,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_tx_id(tx_id)?;
        validate_release_time(release_time)?;

        self.atomically("cash_in_premint_revoke", |this, journal| {
            let shard = this.shard_for(&tx_id)?;
            let previous = shard
                .revoke_cash_in(this.address, tx_id)
                .map_err(|e| CashierError::shard(tx_id, e))?;
            journal.record(UndoEntry::CashIn {
                shard,
                tx_id,
                previous,
            });

            this.collaborators
                .premint
                .schedule_decrease(previous.account, previous.amount, release_time)?;
            journal.record(UndoEntry::Ledger(LedgerUndo::PremintDecreased {
                account: previous.account,
                amount: previous.amount,
                release_time,
            }));

            this.emit(CashierEvent::CashInPremint {
                account: previous.account,
                new_amount: 0,
                old_amount: previous.amount,
                tx_id,
                release_time,
            });
            Ok(())
        })
    }

    /// Replace the amount of a premint cash-in and reschedule its issuance
    pub fn cash_in_premint_update(
        &mut self,
        caller: Address,
        new_amount: Amount,
        tx_id: TxId,
        release_time: ReleaseTime,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_amount(new_amount)?;
        validate_tx_id(tx_id)?;
        validate_release_time(release_time)?;

        self.atomically("cash_in_premint_update", |this, journal| {
            let shard = this.shard_for(&tx_id)?;
            let previous = shard
                .update_cash_in(this.address, tx_id, new_amount)
                .map_err(|e| CashierError::shard(tx_id, e))?;
            journal.record(UndoEntry::CashIn {
                shard,
                tx_id,
                previous,
            });

            this.collaborators.premint.reschedule(
                previous.account,
                previous.amount,
                new_amount,
                release_time,
            )?;
            journal.record(UndoEntry::Ledger(LedgerUndo::Rescheduled {
                account: previous.account,
                old_amount: previous.amount,
                new_amount,
                release_time,
            }));

            this.emit(CashierEvent::CashInPremint {
                account: previous.account,
                new_amount,
                old_amount: previous.amount,
                tx_id,
                release_time,
            });
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Cash-out
    // ------------------------------------------------------------------

    /// Request a cash-out: pin the account, mark it pending and escrow `amount`
    pub fn request_cash_out_from(
        &mut self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_cash_out(account, amount, tx_id)?;
        self.atomically("request_cash_out", |this, journal| {
            this.request_cash_out_in(journal, caller, account, amount, tx_id)
        })
    }

    /// Request several cash-outs; either all of them succeed or none does
    pub fn request_cash_out_from_batch(
        &mut self,
        caller: Address,
        accounts: &[Address],
        amounts: &[Amount],
        tx_ids: &[TxId],
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_batch_shape(accounts.len(), amounts.len(), tx_ids.len())?;
        for ((account, amount), tx_id) in accounts.iter().zip(amounts).zip(tx_ids) {
            validate_cash_out(*account, *amount, *tx_id)?;
        }
        self.atomically("request_cash_out_batch", |this, journal| {
            for ((&account, &amount), &tx_id) in accounts.iter().zip(amounts).zip(tx_ids) {
                this.request_cash_out_in(journal, caller, account, amount, tx_id)?;
            }
            Ok(())
        })
    }

    /// Confirm a pending cash-out, burning the escrowed amount
    pub fn confirm_cash_out(&mut self, caller: Address, tx_id: TxId) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_tx_id(tx_id)?;
        self.atomically("confirm_cash_out", |this, journal| {
            this.confirm_cash_out_in(journal, tx_id)
        })
    }

    pub fn confirm_cash_out_batch(
        &mut self,
        caller: Address,
        tx_ids: &[TxId],
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_id_list(tx_ids)?;
        self.atomically("confirm_cash_out_batch", |this, journal| {
            tx_ids
                .iter()
                .try_for_each(|tx_id| this.confirm_cash_out_in(journal, *tx_id))
        })
    }

    /// Reverse a pending cash-out, returning the escrow to the pinned account
    pub fn reverse_cash_out(&mut self, caller: Address, tx_id: TxId) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_tx_id(tx_id)?;
        self.atomically("reverse_cash_out", |this, journal| {
            this.reverse_cash_out_in(journal, tx_id)
        })
    }

    pub fn reverse_cash_out_batch(
        &mut self,
        caller: Address,
        tx_ids: &[TxId],
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_id_list(tx_ids)?;
        self.atomically("reverse_cash_out_batch", |this, journal| {
            tx_ids
                .iter()
                .try_for_each(|tx_id| this.reverse_cash_out_in(journal, *tx_id))
        })
    }

    /// Atomic cash-out moving `amount` from `from` straight to `to`
    ///
    /// Fires `RequestBefore` and `ConfirmBefore`, then `ConfirmAfter`.
    pub fn make_internal_cash_out(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_cash_out(from, amount, tx_id)?;
        if to.is_zero() {
            return Err(CashierError::AccountAddressZero);
        }

        self.atomically("internal_cash_out", |this, journal| {
            let shard = this.shard_for(&tx_id)?;
            let previous = shard
                .register_internal_cash_out(this.address, from, amount, tx_id)
                .map_err(|e| CashierError::shard(tx_id, e))?;
            journal.record(UndoEntry::CashOut {
                shard,
                tx_id,
                previous,
            });

            this.fire_hooks(
                tx_id,
                &previous,
                &[HookIndex::CashOutRequestBefore, HookIndex::CashOutConfirmBefore],
            )?;
            this.transfer(journal, from, to, amount)?;
            this.emit(CashierEvent::InternalCashOut {
                from,
                tx_id,
                to,
                amount,
            });
            this.fire_hooks(tx_id, &previous, &[HookIndex::CashOutConfirmAfter])
        })
    }

    /// Atomic cash-out removing `amount` from `from` unconditionally
    ///
    /// Fires `RequestBefore` and `ConfirmBefore`, then `RequestAfter` and
    /// `ConfirmAfter`.
    pub fn force_cash_out(
        &mut self,
        caller: Address,
        from: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Cashier)?;
        validate_cash_out(from, amount, tx_id)?;

        self.atomically("forced_cash_out", |this, journal| {
            let shard = this.shard_for(&tx_id)?;
            let previous = shard
                .register_forced_cash_out(this.address, from, amount, tx_id)
                .map_err(|e| CashierError::shard(tx_id, e))?;
            journal.record(UndoEntry::CashOut {
                shard,
                tx_id,
                previous,
            });

            this.fire_hooks(
                tx_id,
                &previous,
                &[HookIndex::CashOutRequestBefore, HookIndex::CashOutConfirmBefore],
            )?;
            this.remove(journal, from, amount)?;
            this.emit(CashierEvent::ForcedCashOut {
                from,
                tx_id,
                amount,
            });
            this.fire_hooks(
                tx_id,
                &previous,
                &[HookIndex::CashOutRequestAfter, HookIndex::CashOutConfirmAfter],
            )
        })
    }

    fn request_cash_out_in(
        &mut self,
        journal: &mut Journal,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<(), CashierError> {
        let shard = self.shard_for(&tx_id)?;
        let previous = shard
            .register_cash_out(self.address, account, amount, tx_id)
            .map_err(|e| CashierError::shard(tx_id, e))?;
        journal.record(UndoEntry::CashOut {
            shard,
            tx_id,
            previous,
        });

        let balance = self.increase_cash_out_balance(journal, account, amount)?;
        self.add_pending(journal, tx_id);
        self.fire_hooks(tx_id, &previous, &[HookIndex::CashOutRequestBefore])?;

        self.transfer(journal, account, self.address, amount)?;
        self.emit(CashierEvent::RequestCashOut {
            account,
            amount,
            balance,
            tx_id,
            sender: caller,
        });
        self.fire_hooks(tx_id, &previous, &[HookIndex::CashOutRequestAfter])
    }

    fn confirm_cash_out_in(&mut self, journal: &mut Journal, tx_id: TxId) -> Result<(), CashierError> {
        let shard = self.shard_for(&tx_id)?;
        let previous = shard
            .process_cash_out(self.address, tx_id, CashOutStatus::Confirmed)
            .map_err(|e| CashierError::shard(tx_id, e))?;
        journal.record(UndoEntry::CashOut {
            shard,
            tx_id,
            previous,
        });

        let balance = self.decrease_cash_out_balance(journal, previous.account, previous.amount);
        self.remove_pending(journal, tx_id);
        self.fire_hooks(tx_id, &previous, &[HookIndex::CashOutConfirmBefore])?;

        self.remove(journal, self.address, previous.amount)?;
        self.emit(CashierEvent::ConfirmCashOut {
            account: previous.account,
            amount: previous.amount,
            balance,
            tx_id,
        });
        self.fire_hooks(tx_id, &previous, &[HookIndex::CashOutConfirmAfter])
    }

    fn reverse_cash_out_in(&mut self, journal: &mut Journal, tx_id: TxId) -> Result<(), CashierError> {
        let shard = self.shard_for(&tx_id)?;
        let previous = shard
            .process_cash_out(self.address, tx_id, CashOutStatus::Reversed)
            .map_err(|e| CashierError::shard(tx_id, e))?;
        journal.record(UndoEntry::CashOut {
            shard,
            tx_id,
            previous,
        });

        let balance = self.decrease_cash_out_balance(journal, previous.account, previous.amount);
        self.remove_pending(journal, tx_id);
        self.fire_hooks(tx_id, &previous, &[HookIndex::CashOutReverseBefore])?;

        self.transfer(journal, self.address, previous.account, previous.amount)?;
        self.emit(CashierEvent::ReverseCashOut {
            account: previous.account,
            amount: previous.amount,
            balance,
            tx_id,
        });
        self.fire_hooks(tx_id, &previous, &[HookIndex::CashOutReverseAfter])
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    /// Configure (or clear, with a zero target and zero flags) the hooks of a
    /// cash-out identifier
    ///
    /// # Errors
    ///
    /// * `HookFlagsInvalid` - bits outside indices 6..=11
    /// * `HookTargetAddressZero` / `HookTargetAddressNonZero` - target and
    ///   flags must be set and cleared together
    /// * `HooksAlreadyRegistered` - the pair equals the stored one
    pub fn configure_cash_out_hooks(
        &mut self,
        caller: Address,
        tx_id: TxId,
        target: Address,
        flags: u16,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::HookAdmin)?;
        validate_tx_id(tx_id)?;
        let flags = HookFlags::from_bits(flags).ok_or(CashierError::HookFlagsInvalid { bits: flags })?;
        if target.is_zero() && !flags.is_empty() {
            return Err(CashierError::HookTargetAddressZero);
        }
        if !target.is_zero() && flags.is_empty() {
            return Err(CashierError::HookTargetAddressNonZero);
        }
        let config = HookConfig { target, flags };
        if self.hooks.config(&tx_id) == config {
            return Err(CashierError::HooksAlreadyRegistered { tx_id });
        }

        self.atomically("configure_cash_out_hooks", |this, journal| {
            let shard = this.shard_for(&tx_id)?;
            let old = this.hooks.set_config(tx_id, config);
            journal.record(UndoEntry::HookConfig {
                tx_id,
                previous: old,
            });

            let flagged = if config.is_empty() {
                shard.reset_cash_out_flag(this.address, tx_id, CashOutFlag::SomeHookRegistered)
            } else {
                shard.set_cash_out_flag(this.address, tx_id, CashOutFlag::SomeHookRegistered)
            };
            let previous = flagged.map_err(|e| CashierError::shard(tx_id, e))?;
            journal.record(UndoEntry::CashOut {
                shard,
                tx_id,
                previous,
            });

            this.emit(CashierEvent::CashOutHooksConfigured {
                tx_id,
                new_target: target,
                old_target: old.target,
                new_flags: flags,
                old_flags: old.flags,
            });
            Ok(())
        })
    }

    /// Register (or replace) the callable behind a hook target address
    pub fn register_hook_target(
        &mut self,
        caller: Address,
        target: Address,
        hook: Arc<dyn CashOutHook>,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::HookAdmin)?;
        if target.is_zero() {
            return Err(CashierError::AccountAddressZero);
        }
        info!(target = %target, "hook target registered");
        self.hooks.register_target(target, hook);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shard administration
    // ------------------------------------------------------------------

    /// Append shards to the registry
    pub fn add_shards(
        &mut self,
        caller: Address,
        shards: Vec<Arc<dyn Shard>>,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Owner)?;
        let addresses: Vec<Address> = shards.iter().map(|shard| shard.address()).collect();
        self.router.add_shards(shards)?;
        for shard in addresses {
            self.emit(CashierEvent::ShardAdded { shard });
        }
        Ok(())
    }

    /// Overwrite the registry slots starting at `start`
    pub fn replace_shards(
        &mut self,
        caller: Address,
        start: usize,
        shards: Vec<Arc<dyn Shard>>,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Owner)?;
        let addresses: Vec<Address> = shards.iter().map(|shard| shard.address()).collect();
        let replaced = self.router.replace_shards(start, shards)?;
        for (new_shard, old) in addresses.into_iter().zip(replaced) {
            self.emit(CashierEvent::ShardReplaced {
                new_shard,
                old_shard: old.address(),
            });
        }
        Ok(())
    }

    /// Grant or withdraw co-administrator trust on every registered shard
    ///
    /// Lets a second coordinator operate on the same shard set.
    pub fn configure_shard_admin(
        &mut self,
        caller: Address,
        account: Address,
        status: bool,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Owner)?;
        if account.is_zero() {
            return Err(CashierError::AccountAddressZero);
        }
        self.ensure_owns_all_shards()?;
        let address = self.address;
        self.apply_to_all_shards(
            "configure_shard_admin",
            |shard| shard.is_admin(account),
            |shard| shard.set_admin(address, account, status),
            |shard, was_admin| shard.set_admin(address, account, was_admin),
        )?;
        self.emit(CashierEvent::ShardAdminConfigured { account, status });
        Ok(())
    }

    /// Hand every registered shard over to another coordinator
    ///
    /// Shards already handed over stay with `new_owner` if a later shard
    /// refuses; each of them is logged.
    pub fn transfer_shard_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Owner)?;
        if new_owner.is_zero() {
            return Err(CashierError::AccountAddressZero);
        }
        self.ensure_owns_all_shards()?;
        let address = self.address;
        self.apply_to_all_shards(
            "transfer_shard_ownership",
            |_| (),
            |shard| shard.transfer_ownership(address, new_owner),
            |_, ()| Err(ShardError::Unauthorized { caller: address }),
        )?;
        self.emit(CashierEvent::ShardOwnershipTransferred { new_owner });
        Ok(())
    }

    /// Switch every registered shard to another implementation version
    pub fn upgrade_shards_to(&mut self, caller: Address, version: u32) -> Result<(), CashierError> {
        self.authorize(caller, Capability::Owner)?;
        self.ensure_owns_all_shards()?;
        let address = self.address;
        self.apply_to_all_shards(
            "upgrade_shards_to",
            |shard| shard.implementation_version(),
            |shard| shard.upgrade_to(address, version),
            |shard, previous| shard.upgrade_to(address, previous),
        )?;
        self.emit(CashierEvent::ShardsUpgraded { version });
        Ok(())
    }

    /// Run `apply` on every registered shard in order
    ///
    /// When a shard fails, the shards already changed are put back with
    /// `restore`, newest first, using the state `capture` read before the
    /// change.
    fn apply_to_all_shards<T>(
        &self,
        operation: &'static str,
        capture: impl Fn(&dyn Shard) -> T,
        apply: impl Fn(&dyn Shard) -> Result<(), ShardError>,
        restore: impl Fn(&dyn Shard, T) -> Result<(), ShardError>,
    ) -> Result<(), CashierError> {
        let mut applied: Vec<(&Arc<dyn Shard>, T)> = Vec::new();
        for shard in self.router.shards() {
            let previous = capture(shard.as_ref());
            if let Err(e) = apply(shard.as_ref()) {
                warn!(operation, shard = %shard.address(), error = %e, "shard administration failed");
                for (done, previous) in applied.into_iter().rev() {
                    if let Err(undo) = restore(done.as_ref(), previous) {
                        error!(operation, shard = %done.address(), error = %undo, "shard left changed");
                    }
                }
                return Err(CashierError::shard_admin(e));
            }
            applied.push((shard, previous));
        }
        Ok(())
    }

    fn ensure_owns_all_shards(&self) -> Result<(), CashierError> {
        match self
            .router
            .shards()
            .iter()
            .find(|shard| shard.owner() != self.address)
        {
            Some(shard) => {
                warn!(shard = %shard.address(), owner = %shard.owner(), "shard not owned by this coordinator");
                Err(CashierError::ShardUnauthorized {
                    caller: self.address,
                })
            }
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn get_cash_in(&self, tx_id: TxId) -> Result<CashIn, CashierError> {
        Ok(self.router.shard_for(&tx_id)?.get_cash_in(tx_id))
    }

    pub fn get_cash_ins(&self, tx_ids: &[TxId]) -> Result<Vec<CashIn>, CashierError> {
        tx_ids.iter().map(|tx_id| self.get_cash_in(*tx_id)).collect()
    }

    pub fn get_cash_out(&self, tx_id: TxId) -> Result<CashOut, CashierError> {
        Ok(self.router.shard_for(&tx_id)?.get_cash_out(tx_id))
    }

    pub fn get_cash_outs(&self, tx_ids: &[TxId]) -> Result<Vec<CashOut>, CashierError> {
        tx_ids.iter().map(|tx_id| self.get_cash_out(*tx_id)).collect()
    }

    /// Address of the shard responsible for `tx_id`
    pub fn get_shard_by_tx_id(&self, tx_id: TxId) -> Result<Address, CashierError> {
        Ok(self.router.shard_for(&tx_id)?.address())
    }

    pub fn get_shard_range(&self, offset: usize, limit: usize) -> Vec<Address> {
        self.router.range(offset, limit)
    }

    pub fn shard_count(&self) -> usize {
        self.router.len()
    }

    /// Pending identifiers in `[offset, offset + limit)`
    ///
    /// The order is only stable until the next confirm or reverse.
    pub fn get_pending_cash_out_tx_ids(&self, offset: usize, limit: usize) -> Vec<TxId> {
        self.pending.range(offset, limit)
    }

    pub fn pending_cash_out_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cash_out_balance_of(&self, account: Address) -> Amount {
        self.cash_out_balances.get(&account).copied().unwrap_or(0)
    }

    pub fn cash_out_hook_config(&self, tx_id: TxId) -> HookConfig {
        self.hooks.config(&tx_id)
    }

    pub fn is_batch_executed(&self, batch_id: BatchId) -> bool {
        self.executed_batches.contains(&batch_id)
    }

    /// Events emitted by committed operations, oldest first
    pub fn events(&self) -> &[CashierEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<CashierEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn authorize(&self, caller: Address, capability: Capability) -> Result<(), CashierError> {
        if self.collaborators.suspend_gate.is_suspended() {
            return Err(CashierError::Suspended);
        }
        if !self
            .collaborators
            .permissions
            .has_privilege(caller, capability)
        {
            return Err(CashierError::unauthorized(caller, capability));
        }
        Ok(())
    }

    fn shard_for(&self, tx_id: &TxId) -> Result<Arc<dyn Shard>, CashierError> {
        let index = self.router.route(tx_id)?;
        let shard = Arc::clone(&self.router.shards()[index]);
        debug!(tx_id = %tx_id, index, shard = %shard.address(), "routed to shard");
        Ok(shard)
    }

    fn emit(&mut self, event: CashierEvent) {
        info!(event = event.name(), details = ?event, "cashier event");
        self.events.push(event);
    }

    fn fire_hooks(
        &mut self,
        tx_id: TxId,
        record: &CashOut,
        indices: &[HookIndex],
    ) -> Result<(), CashierError> {
        self.hooks
            .invoke(tx_id, record, HookFlags::of(indices), &mut self.events)
    }

    fn add_pending(&mut self, journal: &mut Journal, tx_id: TxId) {
        if self.pending.insert(tx_id) {
            journal.record(UndoEntry::PendingAdded(tx_id));
        }
    }

    fn remove_pending(&mut self, journal: &mut Journal, tx_id: TxId) {
        if self.pending.remove(&tx_id) {
            journal.record(UndoEntry::PendingRemoved(tx_id));
        }
    }

    fn increase_cash_out_balance(
        &mut self,
        journal: &mut Journal,
        account: Address,
        amount: Amount,
    ) -> Result<Amount, CashierError> {
        let previous = self.cash_out_balance_of(account);
        let updated = previous
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { account })?;
        self.set_cash_out_balance(account, updated);
        journal.record(UndoEntry::CashOutBalance { account, previous });
        Ok(updated)
    }

    fn decrease_cash_out_balance(
        &mut self,
        journal: &mut Journal,
        account: Address,
        amount: Amount,
    ) -> Amount {
        let previous = self.cash_out_balance_of(account);
        let updated = previous.saturating_sub(amount);
        self.set_cash_out_balance(account, updated);
        journal.record(UndoEntry::CashOutBalance { account, previous });
        updated
    }

    fn set_cash_out_balance(&mut self, account: Address, balance: Amount) {
        if balance == 0 {
            self.cash_out_balances.remove(&account);
        } else {
            self.cash_out_balances.insert(account, balance);
        }
    }

    fn issue(&self, journal: &mut Journal, account: Address, amount: Amount) -> Result<(), CashierError> {
        if !self.collaborators.ledger.issue(account, amount) {
            return Err(CashierError::TokenMintingFailure { account, amount });
        }
        journal.record(UndoEntry::Ledger(LedgerUndo::Issued { account, amount }));
        Ok(())
    }

    fn remove(&self, journal: &mut Journal, account: Address, amount: Amount) -> Result<(), CashierError> {
        self.collaborators.ledger.remove(account, amount)?;
        journal.record(UndoEntry::Ledger(LedgerUndo::Removed { account, amount }));
        Ok(())
    }

    fn transfer(
        &self,
        journal: &mut Journal,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), CashierError> {
        self.collaborators.ledger.transfer(from, to, amount)?;
        journal.record(UndoEntry::Ledger(LedgerUndo::Transferred { from, to, amount }));
        Ok(())
    }

    /// Run `f` as one all-or-nothing operation
    ///
    /// On error every journaled change is undone newest first and the events
    /// emitted by the operation are discarded. Hook callbacks that already ran
    /// cannot be recalled.
    fn atomically<T, F>(&mut self, operation: &'static str, f: F) -> Result<T, CashierError>
    where
        F: FnOnce(&mut Self, &mut Journal) -> Result<T, CashierError>,
    {
        let mut journal = Journal::new(self.events.len());
        match f(self, &mut journal) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(
                    operation,
                    error = %e,
                    undo_entries = journal.len(),
                    "operation aborted, rolling back"
                );
                self.rollback(journal);
                Err(e)
            }
        }
    }

    fn rollback(&mut self, journal: Journal) {
        let event_mark = journal.event_mark();
        for entry in journal.into_undo_order() {
            let kind = entry.kind();
            if let Err(e) = self.undo(entry) {
                error!(entry = kind, error = %e, "compensation failed");
            }
        }
        self.events.truncate(event_mark);
    }

    fn undo(&mut self, entry: UndoEntry) -> Result<(), CashierError> {
        match entry {
            UndoEntry::CashIn {
                shard,
                tx_id,
                previous,
            } => shard
                .restore_cash_in(self.address, tx_id, previous)
                .map_err(|e| CashierError::shard(tx_id, e))?,
            UndoEntry::CashOut {
                shard,
                tx_id,
                previous,
            } => shard
                .restore_cash_out(self.address, tx_id, previous)
                .map_err(|e| CashierError::shard(tx_id, e))?,
            UndoEntry::PendingAdded(tx_id) => {
                self.pending.remove(&tx_id);
            }
            UndoEntry::PendingRemoved(tx_id) => {
                self.pending.insert(tx_id);
            }
            UndoEntry::CashOutBalance { account, previous } => {
                self.set_cash_out_balance(account, previous);
            }
            UndoEntry::BatchMarked(batch_id) => {
                self.executed_batches.remove(&batch_id);
            }
            UndoEntry::HookConfig { tx_id, previous } => {
                self.hooks.set_config(tx_id, previous);
            }
            UndoEntry::Ledger(call) => self.undo_ledger(call)?,
        }
        Ok(())
    }

    fn undo_ledger(&self, call: LedgerUndo) -> Result<(), CashierError> {
        let ledger = &self.collaborators.ledger;
        let premint = &self.collaborators.premint;
        match call {
            LedgerUndo::Issued { account, amount } => ledger.remove(account, amount)?,
            LedgerUndo::Removed { account, amount } => {
                if !ledger.issue(account, amount) {
                    return Err(CashierError::TokenMintingFailure { account, amount });
                }
            }
            LedgerUndo::Transferred { from, to, amount } => ledger.transfer(to, from, amount)?,
            LedgerUndo::PremintIncreased {
                account,
                amount,
                release_time,
            } => premint.schedule_decrease(account, amount, release_time)?,
            LedgerUndo::PremintDecreased {
                account,
                amount,
                release_time,
            } => premint.schedule_increase(account, amount, release_time)?,
            LedgerUndo::Rescheduled {
                account,
                old_amount,
                new_amount,
                release_time,
            } => premint.reschedule(account, new_amount, old_amount, release_time)?,
        }
        Ok(())
    }
}

fn validate_tx_id(tx_id: TxId) -> Result<(), CashierError> {
    if tx_id.is_zero() {
        return Err(CashierError::TxIdZero);
    }
    Ok(())
}

fn validate_amount(amount: Amount) -> Result<(), CashierError> {
    if amount == 0 {
        return Err(CashierError::AmountZero);
    }
    Ok(())
}

fn validate_release_time(release_time: ReleaseTime) -> Result<(), CashierError> {
    if release_time == 0 {
        return Err(CashierError::ReleaseTimeZero);
    }
    Ok(())
}

fn validate_cash_in(account: Address, amount: Amount, tx_id: TxId) -> Result<(), CashierError> {
    if account.is_zero() {
        return Err(CashierError::AccountAddressZero);
    }
    validate_amount(amount)?;
    validate_tx_id(tx_id)
}

fn validate_cash_out(account: Address, amount: Amount, tx_id: TxId) -> Result<(), CashierError> {
    validate_cash_in(account, amount, tx_id)
}

fn validate_batch_shape(accounts: usize, amounts: usize, tx_ids: usize) -> Result<(), CashierError> {
    if accounts != amounts || accounts != tx_ids {
        return Err(CashierError::length_mismatch(accounts, amounts, tx_ids));
    }
    if accounts == 0 {
        return Err(CashierError::InputArraysEmpty);
    }
    Ok(())
}

fn validate_id_list(tx_ids: &[TxId]) -> Result<(), CashierError> {
    if tx_ids.is_empty() {
        return Err(CashierError::InputArraysEmpty);
    }
    tx_ids.iter().try_for_each(|tx_id| validate_tx_id(*tx_id))
}
