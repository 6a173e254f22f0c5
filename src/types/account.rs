//! Per-account summary used for replay output
//!
//! The coordinator itself never stores balances; this structure merges the
//! ledger balance with the coordinator's outstanding cash-out balance.

use super::ids::{Address, Amount};

/// Account state as reported after a replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// The account address
    pub address: Address,

    /// Spendable ledger balance (escrowed cash-outs excluded)
    pub balance: Amount,

    /// Sum of the account's pending cash-out amounts
    ///
    /// This is the amount currently held in escrow by the coordinator on
    /// behalf of the account. It drops back when the cash-out is confirmed
    /// or reversed.
    pub cash_out_balance: Amount,
}

impl Account {
    /// Create an account with zero balances
    ///
    /// # Arguments
    ///
    /// * `address` - The account address
    pub fn new(address: Address) -> Self {
        Account {
            address,
            balance: 0,
            cash_out_balance: 0,
        }
    }
}
