//! Sharded Cashier Library
//!
//! # Overview
//!
//! A cash-in / cash-out coordinator for a fungible-token ledger. Every
//! operation is keyed by an off-chain transaction identifier; the
//! corresponding record lives in one of many shards chosen by hashing the
//! identifier. The coordinator validates requests, routes them, interprets
//! shard result codes, tracks pending cash-outs, fires configured hooks around
//! each transition and moves value through the ledger.
//!
//! # Architecture
//!
//! - [`types`] - Identifiers, records, hook types, events, commands and errors
//! - [`core`] - Business logic:
//!   - [`core::coordinator`] - The coordinator and its all-or-nothing execution
//!   - [`core::shard`] / [`core::router`] - Record storage and routing
//!   - [`core::pending_set`] / [`core::hooks`] - Pending tracking and hook dispatch
//!   - [`core::ledger`] / [`core::access`] - Reference in-memory collaborators
//!   - [`core::deployment`] - A coordinator wired from configuration
//! - [`io`] - Command CSV input and account CSV output
//! - [`strategy`] - Sync and async replay pipelines
//! - [`cli`], [`config`], [`logging`] - The replay binary's plumbing
//!
//! # Cash-out lifecycle
//!
//! - **Request**: pin the account, mark the record pending, escrow the amount
//! - **Confirm**: burn the escrowed amount
//! - **Reverse**: return the escrowed amount; the identifier may be requested again
//! - **Internal**: move value straight to another account
//! - **Forced**: burn value without a request
//!
//! Confirmed, internal and forced records are terminal.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use config::CashierConfig;
pub use core::{Coordinator, Deployment, InMemoryLedger, InMemoryShard, ShardRouter};
pub use io::write_accounts_csv;
pub use types::{
    Account, Address, Amount, BatchId, CashIn, CashInStatus, CashOut, CashOutStatus,
    CashierError, CashierEvent, Command, HookFlags, HookIndex, TxId,
};
