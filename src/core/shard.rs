//! In-memory shard implementation
//!
//! This module provides `InMemoryShard`, a self-contained partition of the
//! cash-in and cash-out record store.
//!
//! # Design
//!
//! Records live in two `DashMap`s keyed by transaction identifier. Every
//! mutation runs while holding the map entry for its identifier, so
//! read-check-write sequences on one record are serialized even when several
//! coordinators share the shard from different threads.
//!
//! # Authorization
//!
//! Record mutations are accepted from the owning coordinator and from any
//! co-administrator. Administration (`set_admin`, `transfer_ownership`,
//! `upgrade_to`) is accepted from the owner only.

use crate::core::traits::Shard;
use crate::types::{
    Address, Amount, CashIn, CashInStatus, CashOut, CashOutFlag, CashOutStatus, ShardError, TxId,
};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// Implementation version a freshly created shard reports
pub const INITIAL_SHARD_VERSION: u32 = 1;

/// Record store partition backed by concurrent maps
#[derive(Debug)]
pub struct InMemoryShard {
    address: Address,
    owner: RwLock<Address>,
    admins: DashSet<Address>,
    version: AtomicU32,
    cash_ins: DashMap<TxId, CashIn>,
    cash_outs: DashMap<TxId, CashOut>,
}

impl InMemoryShard {
    /// Create an empty shard
    ///
    /// # Arguments
    ///
    /// * `address` - Identity of the shard
    /// * `owner` - Coordinator allowed to mutate and administer it
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner: RwLock::new(owner),
            admins: DashSet::new(),
            version: AtomicU32::new(INITIAL_SHARD_VERSION),
            cash_ins: DashMap::new(),
            cash_outs: DashMap::new(),
        }
    }

    fn current_owner(&self) -> Address {
        *self.owner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn authorize(&self, caller: Address) -> Result<(), ShardError> {
        if caller == self.current_owner() || self.admins.contains(&caller) {
            Ok(())
        } else {
            Err(ShardError::Unauthorized { caller })
        }
    }

    fn authorize_owner(&self, caller: Address) -> Result<(), ShardError> {
        if caller == self.current_owner() {
            Ok(())
        } else {
            Err(ShardError::Unauthorized { caller })
        }
    }

    fn mutate_cash_in<F>(&self, caller: Address, tx_id: TxId, f: F) -> Result<CashIn, ShardError>
    where
        F: FnOnce(&mut CashIn) -> Result<(), ShardError>,
    {
        self.authorize(caller)?;
        mutate_record(&self.cash_ins, tx_id, f)
    }

    fn mutate_cash_out<F>(&self, caller: Address, tx_id: TxId, f: F) -> Result<CashOut, ShardError>
    where
        F: FnOnce(&mut CashOut) -> Result<(), ShardError>,
    {
        self.authorize(caller)?;
        mutate_record(&self.cash_outs, tx_id, f)
    }

    /// Number of cash-in records held
    pub fn cash_in_count(&self) -> usize {
        self.cash_ins.len()
    }

    /// Number of cash-out records held
    pub fn cash_out_count(&self) -> usize {
        self.cash_outs.len()
    }

    /// Shared registration path of the three cash-out variants
    ///
    /// The account check precedes the status check: a caller naming the wrong
    /// account learns the pinned one regardless of the current status.
    fn register_cash_out_as(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
        target_status: CashOutStatus,
    ) -> Result<CashOut, ShardError> {
        let previous = self.mutate_cash_out(caller, tx_id, |record| {
            if record.status != CashOutStatus::Nonexistent && record.account != account {
                return Err(ShardError::CashOutAccountInappropriate(record.account));
            }
            if !record.status.accepts_registration() {
                return Err(ShardError::CashOutStatusInappropriate(record.status));
            }
            record.account = account;
            record.amount = amount;
            record.status = target_status;
            Ok(())
        })?;
        debug!(
            shard = %self.address,
            tx_id = %tx_id,
            from = %previous.status,
            to = %target_status,
            "cash-out registered"
        );
        Ok(previous)
    }
}

/// Apply `f` to a copy of the record and commit it only if `f` succeeds
///
/// The entry stays locked for the whole read-check-write. A missing record
/// reads as the default; a record equal to the default is never stored.
///
/// # Returns
///
/// The record as it was before the call
fn mutate_record<R, F>(records: &DashMap<TxId, R>, tx_id: TxId, f: F) -> Result<R, ShardError>
where
    R: Copy + Default + PartialEq,
    F: FnOnce(&mut R) -> Result<(), ShardError>,
{
    match records.entry(tx_id) {
        Entry::Occupied(mut entry) => {
            let previous = *entry.get();
            let mut next = previous;
            f(&mut next)?;
            if next == R::default() {
                entry.remove();
            } else {
                entry.insert(next);
            }
            Ok(previous)
        }
        Entry::Vacant(entry) => {
            let mut next = R::default();
            f(&mut next)?;
            if next != R::default() {
                entry.insert(next);
            }
            Ok(R::default())
        }
    }
}

/// Put `record` back under `tx_id`, dropping the entry for a default record
fn restore_record<R>(records: &DashMap<TxId, R>, tx_id: TxId, record: R)
where
    R: Default + PartialEq,
{
    if record == R::default() {
        records.remove(&tx_id);
    } else {
        records.insert(tx_id, record);
    }
}

impl Shard for InMemoryShard {
    fn address(&self) -> Address {
        self.address
    }

    fn owner(&self) -> Address {
        self.current_owner()
    }

    fn is_admin(&self, account: Address) -> bool {
        self.admins.contains(&account)
    }

    fn implementation_version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    fn register_cash_in(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
        target_status: CashInStatus,
    ) -> Result<CashIn, ShardError> {
        self.mutate_cash_in(caller, tx_id, |record| {
            if record.status != CashInStatus::Nonexistent {
                return Err(ShardError::CashInAlreadyExecuted);
            }
            if target_status == CashInStatus::Nonexistent {
                return Err(ShardError::CashInStatusInappropriate(record.status));
            }
            record.account = account;
            record.amount = amount;
            record.status = target_status;
            Ok(())
        })
    }

    fn revoke_cash_in(&self, caller: Address, tx_id: TxId) -> Result<CashIn, ShardError> {
        self.mutate_cash_in(caller, tx_id, |record| {
            if record.status != CashInStatus::PremintExecuted {
                return Err(ShardError::CashInStatusInappropriate(record.status));
            }
            record.amount = 0;
            record.status = CashInStatus::Nonexistent;
            Ok(())
        })
    }

    fn update_cash_in(
        &self,
        caller: Address,
        tx_id: TxId,
        amount: Amount,
    ) -> Result<CashIn, ShardError> {
        self.mutate_cash_in(caller, tx_id, |record| {
            if record.status != CashInStatus::PremintExecuted {
                return Err(ShardError::CashInStatusInappropriate(record.status));
            }
            record.amount = amount;
            Ok(())
        })
    }

    fn register_cash_out(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<CashOut, ShardError> {
        self.register_cash_out_as(caller, account, amount, tx_id, CashOutStatus::Pending)
    }

    fn register_internal_cash_out(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<CashOut, ShardError> {
        self.register_cash_out_as(caller, account, amount, tx_id, CashOutStatus::Internal)
    }

    fn register_forced_cash_out(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        tx_id: TxId,
    ) -> Result<CashOut, ShardError> {
        self.register_cash_out_as(caller, account, amount, tx_id, CashOutStatus::Forced)
    }

    fn process_cash_out(
        &self,
        caller: Address,
        tx_id: TxId,
        target_status: CashOutStatus,
    ) -> Result<CashOut, ShardError> {
        self.mutate_cash_out(caller, tx_id, |record| {
            let target_allowed = matches!(
                target_status,
                CashOutStatus::Confirmed | CashOutStatus::Reversed
            );
            if record.status != CashOutStatus::Pending || !target_allowed {
                return Err(ShardError::CashOutStatusInappropriate(record.status));
            }
            record.status = target_status;
            Ok(())
        })
    }

    fn set_cash_out_flag(
        &self,
        caller: Address,
        tx_id: TxId,
        flag: CashOutFlag,
    ) -> Result<CashOut, ShardError> {
        self.mutate_cash_out(caller, tx_id, |record| {
            record.flags |= flag.mask();
            Ok(())
        })
    }

    fn reset_cash_out_flag(
        &self,
        caller: Address,
        tx_id: TxId,
        flag: CashOutFlag,
    ) -> Result<CashOut, ShardError> {
        self.mutate_cash_out(caller, tx_id, |record| {
            record.flags &= !flag.mask();
            Ok(())
        })
    }

    fn restore_cash_in(
        &self,
        caller: Address,
        tx_id: TxId,
        record: CashIn,
    ) -> Result<(), ShardError> {
        self.authorize(caller)?;
        restore_record(&self.cash_ins, tx_id, record);
        Ok(())
    }

    fn restore_cash_out(
        &self,
        caller: Address,
        tx_id: TxId,
        record: CashOut,
    ) -> Result<(), ShardError> {
        self.authorize(caller)?;
        restore_record(&self.cash_outs, tx_id, record);
        Ok(())
    }

    fn get_cash_in(&self, tx_id: TxId) -> CashIn {
        self.cash_ins
            .get(&tx_id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    fn get_cash_out(&self, tx_id: TxId) -> CashOut {
        self.cash_outs
            .get(&tx_id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    fn set_admin(&self, caller: Address, account: Address, status: bool) -> Result<(), ShardError> {
        self.authorize_owner(caller)?;
        if status {
            self.admins.insert(account);
        } else {
            self.admins.remove(&account);
        }
        Ok(())
    }

    fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<(), ShardError> {
        self.authorize_owner(caller)?;
        let mut owner = self.owner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *owner = new_owner;
        Ok(())
    }

    fn upgrade_to(&self, caller: Address, version: u32) -> Result<(), ShardError> {
        self.authorize_owner(caller)?;
        self.version.store(version, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    const OWNER: u64 = 0xc0;
    const ALICE: u64 = 0xa1;
    const BOB: u64 = 0xb0;

    #[fixture]
    fn shard() -> InMemoryShard {
        InMemoryShard::new(Address::from(0x5), Address::from(OWNER))
    }

    fn owner() -> Address {
        Address::from(OWNER)
    }

    #[rstest]
    fn test_register_cash_in(shard: InMemoryShard) {
        let tx = TxId::from(1);
        let previous = shard
            .register_cash_in(owner(), Address::from(ALICE), 100, tx, CashInStatus::Executed)
            .unwrap();
        assert_eq!(previous, CashIn::default());
        assert_eq!(
            shard.get_cash_in(tx),
            CashIn {
                account: Address::from(ALICE),
                amount: 100,
                status: CashInStatus::Executed
            }
        );
    }

    #[rstest]
    #[case::executed(CashInStatus::Executed)]
    #[case::premint(CashInStatus::PremintExecuted)]
    fn test_second_cash_in_is_already_executed(shard: InMemoryShard, #[case] first: CashInStatus) {
        let tx = TxId::from(1);
        shard
            .register_cash_in(owner(), Address::from(ALICE), 100, tx, first)
            .unwrap();
        let result =
            shard.register_cash_in(owner(), Address::from(BOB), 5, tx, CashInStatus::Executed);
        assert_eq!(result, Err(ShardError::CashInAlreadyExecuted));
        assert_eq!(shard.get_cash_in(tx).account, Address::from(ALICE));
    }

    #[rstest]
    fn test_revoke_requires_premint(shard: InMemoryShard) {
        let tx = TxId::from(1);
        shard
            .register_cash_in(owner(), Address::from(ALICE), 100, tx, CashInStatus::Executed)
            .unwrap();
        assert_eq!(
            shard.revoke_cash_in(owner(), tx),
            Err(ShardError::CashInStatusInappropriate(CashInStatus::Executed))
        );
    }

    #[rstest]
    fn test_revoke_and_update_premint(shard: InMemoryShard) {
        let tx = TxId::from(1);
        shard
            .register_cash_in(owner(), Address::from(ALICE), 100, tx, CashInStatus::PremintExecuted)
            .unwrap();

        let before_update = shard.update_cash_in(owner(), tx, 150).unwrap();
        assert_eq!(before_update.amount, 100);
        assert_eq!(shard.get_cash_in(tx).amount, 150);

        let before_revoke = shard.revoke_cash_in(owner(), tx).unwrap();
        assert_eq!(before_revoke.amount, 150);
        let revoked = shard.get_cash_in(tx);
        assert_eq!(revoked.status, CashInStatus::Nonexistent);
        assert_eq!(revoked.amount, 0);

        // A revoked identifier can be cashed in again
        assert!(shard
            .register_cash_in(owner(), Address::from(ALICE), 7, tx, CashInStatus::Executed)
            .is_ok());
    }

    #[rstest]
    fn test_cash_out_account_is_pinned(shard: InMemoryShard) {
        let tx = TxId::from(2);
        shard
            .register_cash_out(owner(), Address::from(ALICE), 80, tx)
            .unwrap();
        shard
            .process_cash_out(owner(), tx, CashOutStatus::Reversed)
            .unwrap();

        assert_eq!(
            shard.register_cash_out(owner(), Address::from(BOB), 80, tx),
            Err(ShardError::CashOutAccountInappropriate(Address::from(ALICE)))
        );

        let previous = shard
            .register_cash_out(owner(), Address::from(ALICE), 60, tx)
            .unwrap();
        assert_eq!(previous.status, CashOutStatus::Reversed);
        assert_eq!(shard.get_cash_out(tx).amount, 60);
        assert_eq!(shard.get_cash_out(tx).status, CashOutStatus::Pending);
    }

    #[rstest]
    #[case::pending(CashOutStatus::Pending)]
    #[case::confirmed(CashOutStatus::Confirmed)]
    fn test_cash_out_registration_from_illegal_status(
        shard: InMemoryShard,
        #[case] status: CashOutStatus,
    ) {
        let tx = TxId::from(3);
        shard
            .register_cash_out(owner(), Address::from(ALICE), 10, tx)
            .unwrap();
        if status == CashOutStatus::Confirmed {
            shard.process_cash_out(owner(), tx, status).unwrap();
        }
        assert_eq!(
            shard.register_internal_cash_out(owner(), Address::from(ALICE), 10, tx),
            Err(ShardError::CashOutStatusInappropriate(status))
        );
    }

    #[rstest]
    #[case::confirm_nonexistent(None, CashOutStatus::Confirmed, Err(ShardError::CashOutStatusInappropriate(CashOutStatus::Nonexistent)))]
    #[case::reverse_pending(Some(CashOutStatus::Pending), CashOutStatus::Reversed, Ok(CashOutStatus::Reversed))]
    #[case::confirm_pending(Some(CashOutStatus::Pending), CashOutStatus::Confirmed, Ok(CashOutStatus::Confirmed))]
    #[case::pending_target(Some(CashOutStatus::Pending), CashOutStatus::Internal, Err(ShardError::CashOutStatusInappropriate(CashOutStatus::Pending)))]
    fn test_process_cash_out(
        shard: InMemoryShard,
        #[case] setup: Option<CashOutStatus>,
        #[case] target: CashOutStatus,
        #[case] expected: Result<CashOutStatus, ShardError>,
    ) {
        let tx = TxId::from(4);
        if setup.is_some() {
            shard
                .register_cash_out(owner(), Address::from(ALICE), 10, tx)
                .unwrap();
        }
        let result = shard
            .process_cash_out(owner(), tx, target)
            .map(|_| shard.get_cash_out(tx).status);
        assert_eq!(result, expected);
    }

    #[rstest]
    fn test_hook_flag_survives_registration(shard: InMemoryShard) {
        let tx = TxId::from(5);
        shard
            .set_cash_out_flag(owner(), tx, CashOutFlag::SomeHookRegistered)
            .unwrap();
        shard
            .register_cash_out(owner(), Address::from(ALICE), 10, tx)
            .unwrap();
        let record = shard.get_cash_out(tx);
        assert!(record.has_hooks());
        assert_eq!(record.account, Address::from(ALICE));

        shard
            .reset_cash_out_flag(owner(), tx, CashOutFlag::SomeHookRegistered)
            .unwrap();
        assert!(!shard.get_cash_out(tx).has_hooks());
    }

    #[rstest]
    fn test_unauthorized_caller(shard: InMemoryShard) {
        let stranger = Address::from(0xee);
        assert_eq!(
            shard.register_cash_out(stranger, Address::from(ALICE), 10, TxId::from(1)),
            Err(ShardError::Unauthorized { caller: stranger })
        );
        assert_eq!(
            shard.restore_cash_in(stranger, TxId::from(1), CashIn::default()),
            Err(ShardError::Unauthorized { caller: stranger })
        );
    }

    #[rstest]
    fn test_admin_may_mutate_but_not_administer(shard: InMemoryShard) {
        let admin = Address::from(0xad);
        shard.set_admin(owner(), admin, true).unwrap();
        assert!(shard.is_admin(admin));
        assert!(shard
            .register_cash_out(admin, Address::from(ALICE), 10, TxId::from(1))
            .is_ok());
        assert_eq!(
            shard.upgrade_to(admin, 2),
            Err(ShardError::Unauthorized { caller: admin })
        );

        shard.set_admin(owner(), admin, false).unwrap();
        assert!(!shard.is_admin(admin));
    }

    #[rstest]
    fn test_transfer_ownership_and_upgrade(shard: InMemoryShard) {
        let next = Address::from(0xc1);
        assert_eq!(shard.implementation_version(), INITIAL_SHARD_VERSION);
        shard.transfer_ownership(owner(), next).unwrap();
        assert_eq!(shard.owner(), next);
        assert!(shard.upgrade_to(owner(), 2).is_err());
        shard.upgrade_to(next, 2).unwrap();
        assert_eq!(shard.implementation_version(), 2);
    }

    #[rstest]
    fn test_failed_mutation_leaves_record_untouched(shard: InMemoryShard) {
        let tx = TxId::from(9);
        shard
            .register_cash_out(owner(), Address::from(ALICE), 10, tx)
            .unwrap();
        let before = shard.get_cash_out(tx);
        assert!(shard
            .register_cash_out(owner(), Address::from(ALICE), 99, tx)
            .is_err());
        assert_eq!(shard.get_cash_out(tx), before);
    }

    #[rstest]
    fn test_rejected_operations_store_nothing(shard: InMemoryShard) {
        for i in 1..=100u64 {
            let tx = TxId::from(i);
            assert!(shard.process_cash_out(owner(), tx, CashOutStatus::Confirmed).is_err());
            assert!(shard.process_cash_out(owner(), tx, CashOutStatus::Reversed).is_err());
            assert!(shard.revoke_cash_in(owner(), tx).is_err());
            assert!(shard.update_cash_in(owner(), tx, 5).is_err());
            assert!(shard
                .register_cash_in(owner(), Address::from(ALICE), 1, tx, CashInStatus::Nonexistent)
                .is_err());
        }
        assert_eq!(shard.cash_in_count(), 0);
        assert_eq!(shard.cash_out_count(), 0);
        assert_eq!(shard.get_cash_out(TxId::from(1)), CashOut::default());
    }

    #[rstest]
    fn test_restoring_default_record_drops_entry(shard: InMemoryShard) {
        let tx = TxId::from(3);
        let previous_in = shard
            .register_cash_in(owner(), Address::from(ALICE), 100, tx, CashInStatus::Executed)
            .unwrap();
        let previous_out = shard
            .register_cash_out(owner(), Address::from(ALICE), 10, tx)
            .unwrap();
        assert_eq!(shard.cash_in_count(), 1);
        assert_eq!(shard.cash_out_count(), 1);

        shard.restore_cash_in(owner(), tx, previous_in).unwrap();
        shard.restore_cash_out(owner(), tx, previous_out).unwrap();
        assert_eq!(shard.cash_in_count(), 0);
        assert_eq!(shard.cash_out_count(), 0);
    }

    #[rstest]
    fn test_clearing_flag_on_fresh_record_drops_entry(shard: InMemoryShard) {
        let tx = TxId::from(4);
        shard
            .set_cash_out_flag(owner(), tx, CashOutFlag::SomeHookRegistered)
            .unwrap();
        assert_eq!(shard.cash_out_count(), 1);
        shard
            .reset_cash_out_flag(owner(), tx, CashOutFlag::SomeHookRegistered)
            .unwrap();
        assert_eq!(shard.cash_out_count(), 0);
    }
}
