//! Types module
//!
//! Contains the plain data structures shared by every layer:
//! - `ids`: transaction, batch and account identifiers
//! - `cash_in` / `cash_out`: shard records and their statuses
//! - `hook`: hook indices, flag masks and configurations
//! - `event`: observability events
//! - `command`: replayable operator commands
//! - `access`: capabilities checked by the permission service
//! - `error`: error types for the cashier

pub mod access;
pub mod account;
pub mod cash_in;
pub mod cash_out;
pub mod command;
pub mod error;
pub mod event;
pub mod hook;
pub mod ids;

pub use access::Capability;
pub use account::Account;
pub use cash_in::{CashIn, CashInExecutionResult, CashInStatus};
pub use cash_out::{CashOut, CashOutFlag, CashOutStatus};
pub use command::{Command, CommandKind};
pub use error::{
    checked_amount, CashierError, ErrorCategory, HookError, LedgerError, ShardError,
};
pub use event::CashierEvent;
pub use hook::{HookConfig, HookFlags, HookIndex};
pub use ids::{Address, Amount, BatchId, ReleaseTime, TxId};
