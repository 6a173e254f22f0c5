//! Core business logic module
//!
//! This module contains the cashier components:
//! - `traits` - Shard and collaborator abstractions
//! - `shard` - In-memory shard storing cash-in / cash-out records
//! - `router` - Deterministic transaction-to-shard routing and the shard registry
//! - `pending_set` - Enumerable set of pending cash-outs
//! - `hooks` - Cash-out hook configuration and dispatch
//! - `journal` - Undo journal backing all-or-nothing operations
//! - `coordinator` - Validation, routing, hooks and value movement
//! - `ledger` / `access` - Reference in-memory collaborators
//! - `deployment` - A coordinator wired from configuration

pub mod access;
pub mod coordinator;
pub mod deployment;
pub mod hooks;
pub mod journal;
pub mod ledger;
pub mod pending_set;
pub mod router;
pub mod shard;
pub mod traits;

pub use access::{RoleTable, SuspendSwitch};
pub use coordinator::{Collaborators, Coordinator};
pub use deployment::Deployment;
pub use hooks::HookDispatcher;
pub use ledger::InMemoryLedger;
pub use pending_set::PendingSet;
pub use router::{shard_index, ShardRouter, MAX_SHARD_COUNT};
pub use shard::InMemoryShard;
pub use traits::{CashOutHook, FungibleLedger, PermissionService, PremintLedger, Shard, SuspendGate};
