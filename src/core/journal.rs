//! Undo journal for coordinator operations
//!
//! Every state change made while an operation is in flight is recorded here
//! together with what is needed to reverse it. When the operation fails the
//! coordinator replays the entries newest first, which leaves shards, the
//! pending set, balances, hook configuration and the ledger as they were.

use crate::core::traits::Shard;
use crate::types::{Address, Amount, BatchId, CashIn, CashOut, HookConfig, ReleaseTime, TxId};
use std::sync::Arc;

/// Ledger call made by an in-flight operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUndo {
    Issued {
        account: Address,
        amount: Amount,
    },
    Removed {
        account: Address,
        amount: Amount,
    },
    Transferred {
        from: Address,
        to: Address,
        amount: Amount,
    },
    PremintIncreased {
        account: Address,
        amount: Amount,
        release_time: ReleaseTime,
    },
    PremintDecreased {
        account: Address,
        amount: Amount,
        release_time: ReleaseTime,
    },
    Rescheduled {
        account: Address,
        old_amount: Amount,
        new_amount: Amount,
        release_time: ReleaseTime,
    },
}

/// A single reversible state change
pub enum UndoEntry {
    CashIn {
        shard: Arc<dyn Shard>,
        tx_id: TxId,
        previous: CashIn,
    },
    CashOut {
        shard: Arc<dyn Shard>,
        tx_id: TxId,
        previous: CashOut,
    },
    PendingAdded(TxId),
    PendingRemoved(TxId),
    CashOutBalance {
        account: Address,
        previous: Amount,
    },
    BatchMarked(BatchId),
    HookConfig {
        tx_id: TxId,
        previous: HookConfig,
    },
    Ledger(LedgerUndo),
}

impl UndoEntry {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            UndoEntry::CashIn { .. } => "cash_in_record",
            UndoEntry::CashOut { .. } => "cash_out_record",
            UndoEntry::PendingAdded(_) => "pending_added",
            UndoEntry::PendingRemoved(_) => "pending_removed",
            UndoEntry::CashOutBalance { .. } => "cash_out_balance",
            UndoEntry::BatchMarked(_) => "batch_marked",
            UndoEntry::HookConfig { .. } => "hook_config",
            UndoEntry::Ledger(_) => "ledger",
        }
    }
}

/// Ordered record of the changes made by one operation
pub struct Journal {
    entries: Vec<UndoEntry>,
    event_mark: usize,
}

impl Journal {
    /// Start a journal for an operation
    ///
    /// # Arguments
    ///
    /// * `event_mark` - Number of events emitted before the operation started
    pub fn new(event_mark: usize) -> Self {
        Self {
            entries: Vec::new(),
            event_mark,
        }
    }

    pub fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    pub fn event_mark(&self) -> usize {
        self.event_mark
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the journal, yielding entries newest first
    pub fn into_undo_order(self) -> impl Iterator<Item = UndoEntry> {
        self.entries.into_iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_replay_newest_first() {
        let mut journal = Journal::new(3);
        journal.record(UndoEntry::PendingAdded(TxId::from(1)));
        journal.record(UndoEntry::BatchMarked(BatchId::from(2)));
        journal.record(UndoEntry::Ledger(LedgerUndo::Issued {
            account: Address::from(1),
            amount: 5,
        }));

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.event_mark(), 3);
        let kinds: Vec<&str> = journal.into_undo_order().map(|entry| entry.kind()).collect();
        assert_eq!(kinds, vec!["ledger", "batch_marked", "pending_added"]);
    }
}
