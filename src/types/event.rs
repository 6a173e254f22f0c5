//! Observability events emitted by the coordinator
//!
//! Field order inside each variant is part of the external contract and must
//! not be rearranged.

use super::cash_in::CashInExecutionResult;
use super::hook::{HookFlags, HookIndex};
use super::ids::{Address, Amount, BatchId, ReleaseTime, TxId};

/// Events emitted by committed coordinator operations
///
/// Events produced by an operation that later aborts are discarded together
/// with the rest of its effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CashierEvent {
    CashIn {
        account: Address,
        amount: Amount,
        tx_id: TxId,
    },

    /// Emitted for premint creation (`old_amount == 0`), revocation
    /// (`new_amount == 0`) and update
    CashInPremint {
        account: Address,
        new_amount: Amount,
        old_amount: Amount,
        tx_id: TxId,
        release_time: ReleaseTime,
    },

    CashInBatch {
        batch_id: BatchId,
        tx_ids: Vec<TxId>,
        outcomes: Vec<CashInExecutionResult>,
    },

    /// `balance` is the account's outstanding cash-out balance after the request
    RequestCashOut {
        account: Address,
        amount: Amount,
        balance: Amount,
        tx_id: TxId,
        sender: Address,
    },

    ConfirmCashOut {
        account: Address,
        amount: Amount,
        balance: Amount,
        tx_id: TxId,
    },

    ReverseCashOut {
        account: Address,
        amount: Amount,
        balance: Amount,
        tx_id: TxId,
    },

    InternalCashOut {
        from: Address,
        tx_id: TxId,
        to: Address,
        amount: Amount,
    },

    ForcedCashOut {
        from: Address,
        tx_id: TxId,
        amount: Amount,
    },

    CashOutHooksConfigured {
        tx_id: TxId,
        new_target: Address,
        old_target: Address,
        new_flags: HookFlags,
        old_flags: HookFlags,
    },

    HookInvoked {
        tx_id: TxId,
        hook_index: HookIndex,
        target: Address,
    },

    ShardAdded {
        shard: Address,
    },

    ShardReplaced {
        new_shard: Address,
        old_shard: Address,
    },

    ShardAdminConfigured {
        account: Address,
        status: bool,
    },

    ShardOwnershipTransferred {
        new_owner: Address,
    },

    ShardsUpgraded {
        version: u32,
    },
}

impl CashierEvent {
    /// Stable event name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            CashierEvent::CashIn { .. } => "CashIn",
            CashierEvent::CashInPremint { .. } => "CashInPremint",
            CashierEvent::CashInBatch { .. } => "CashInBatch",
            CashierEvent::RequestCashOut { .. } => "RequestCashOut",
            CashierEvent::ConfirmCashOut { .. } => "ConfirmCashOut",
            CashierEvent::ReverseCashOut { .. } => "ReverseCashOut",
            CashierEvent::InternalCashOut { .. } => "InternalCashOut",
            CashierEvent::ForcedCashOut { .. } => "ForcedCashOut",
            CashierEvent::CashOutHooksConfigured { .. } => "CashOutHooksConfigured",
            CashierEvent::HookInvoked { .. } => "HookInvoked",
            CashierEvent::ShardAdded { .. } => "ShardAdded",
            CashierEvent::ShardReplaced { .. } => "ShardReplaced",
            CashierEvent::ShardAdminConfigured { .. } => "ShardAdminConfigured",
            CashierEvent::ShardOwnershipTransferred { .. } => "ShardOwnershipTransferred",
            CashierEvent::ShardsUpgraded { .. } => "ShardsUpgraded",
        }
    }
}
