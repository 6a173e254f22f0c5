//! In-memory fungible ledger with a premint sub-ledger
//!
//! This module provides `InMemoryLedger`, the reference implementation of
//! [`FungibleLedger`] and [`PremintLedger`] used by the replay binary and the
//! tests.
//!
//! # Design
//!
//! Balances are kept in a `DashMap` keyed by address; an account entry is
//! created the first time it is credited. All arithmetic is checked: an
//! issuance that would push the total supply past the mint cap is refused
//! (`issue` returns `false`), and debits larger than the balance fail with
//! `LedgerError::InsufficientBalance`.
//!
//! Scheduled issuance is kept per `(account, release_time)` pair.

use crate::core::traits::{FungibleLedger, PremintLedger};
use crate::types::{Address, Amount, LedgerError, ReleaseTime};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe in-memory token ledger
#[derive(Debug)]
pub struct InMemoryLedger {
    /// Spendable balance per account
    balances: DashMap<Address, Amount>,

    /// Scheduled issuance per account and release time
    premints: DashMap<(Address, ReleaseTime), Amount>,

    /// Sum of all balances
    total_supply: AtomicU64,

    /// Upper bound on the total supply
    mint_cap: Amount,
}

impl InMemoryLedger {
    /// Create an empty ledger whose supply may grow up to `u64::MAX`
    pub fn new() -> Self {
        Self::with_mint_cap(Amount::MAX)
    }

    /// Create an empty ledger with a custom supply ceiling
    ///
    /// # Arguments
    ///
    /// * `mint_cap` - Largest total supply `issue` will accept
    pub fn with_mint_cap(mint_cap: Amount) -> Self {
        Self {
            balances: DashMap::new(),
            premints: DashMap::new(),
            total_supply: AtomicU64::new(0),
            mint_cap,
        }
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply.load(Ordering::Acquire)
    }

    /// Snapshot of every account that has ever been credited, sorted by address
    pub fn accounts(&self) -> Vec<(Address, Amount)> {
        let mut accounts: Vec<(Address, Amount)> = self
            .balances
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        accounts.sort_by_key(|(address, _)| *address);
        accounts
    }

    fn debit(&self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let balance = self.balance_of(account);
        let insufficient = LedgerError::InsufficientBalance {
            account,
            balance,
            requested: amount,
        };
        let mut entry = self.balances.get_mut(&account).ok_or(insufficient.clone())?;
        let remaining = entry.value().checked_sub(amount).ok_or(insufficient)?;
        *entry.value_mut() = remaining;
        Ok(())
    }

    fn credit(&self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let mut entry = self.balances.entry(account).or_insert(0);
        let updated = entry
            .value()
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { account })?;
        *entry.value_mut() = updated;
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FungibleLedger for InMemoryLedger {
    fn issue(&self, account: Address, amount: Amount) -> bool {
        let cap = self.mint_cap;
        let reserved = self
            .total_supply
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |supply| {
                supply.checked_add(amount).filter(|next| *next <= cap)
            });
        if reserved.is_err() {
            return false;
        }
        if self.credit(account, amount).is_err() {
            self.total_supply.fetch_sub(amount, Ordering::AcqRel);
            return false;
        }
        true
    }

    fn remove(&self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        self.debit(account, amount)?;
        self.total_supply.fetch_sub(amount, Ordering::AcqRel);
        Ok(())
    }

    fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        self.debit(from, amount)?;
        if let Err(e) = self.credit(to, amount) {
            self.credit(from, amount)?;
            return Err(e);
        }
        Ok(())
    }

    fn balance_of(&self, account: Address) -> Amount {
        self.balances
            .get(&account)
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }
}

impl PremintLedger for InMemoryLedger {
    fn schedule_increase(
        &self,
        account: Address,
        amount: Amount,
        release_time: ReleaseTime,
    ) -> Result<(), LedgerError> {
        let mut entry = self.premints.entry((account, release_time)).or_insert(0);
        let updated = entry
            .value()
            .checked_add(amount)
            .ok_or(LedgerError::PremintOverflow {
                account,
                release_time,
            })?;
        *entry.value_mut() = updated;
        Ok(())
    }

    fn schedule_decrease(
        &self,
        account: Address,
        amount: Amount,
        release_time: ReleaseTime,
    ) -> Result<(), LedgerError> {
        let scheduled = self.scheduled(account, release_time);
        let insufficient = LedgerError::PremintInsufficient {
            account,
            release_time,
            scheduled,
            requested: amount,
        };
        let mut entry = self
            .premints
            .get_mut(&(account, release_time))
            .ok_or(insufficient.clone())?;
        let remaining = entry.value().checked_sub(amount).ok_or(insufficient)?;
        *entry.value_mut() = remaining;
        Ok(())
    }

    fn scheduled(&self, account: Address, release_time: ReleaseTime) -> Amount {
        self.premints
            .get(&(account, release_time))
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }
}
