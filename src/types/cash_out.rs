//! Cash-out types
//!
//! The account bound to a cash-out identifier is pinned on first registration
//! and never changes afterwards, including after a reversal.

use super::ids::{Address, Amount};
use std::fmt;

/// Status of a cash-out record
///
/// `Confirmed`, `Internal` and `Forced` are terminal. `Reversed` allows exactly
/// one way forward: a new request for the same account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CashOutStatus {
    #[default]
    Nonexistent = 0,
    Pending = 1,
    Reversed = 2,
    Confirmed = 3,
    Internal = 4,
    Forced = 5,
}

impl CashOutStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CashOutStatus::Confirmed | CashOutStatus::Internal | CashOutStatus::Forced
        )
    }

    /// Whether a new registration (request, internal or forced) may start from
    /// this status
    #[inline]
    pub fn accepts_registration(&self) -> bool {
        matches!(self, CashOutStatus::Nonexistent | CashOutStatus::Reversed)
    }

    /// Human-readable status name
    pub fn as_str(&self) -> &'static str {
        match self {
            CashOutStatus::Nonexistent => "nonexistent",
            CashOutStatus::Pending => "pending",
            CashOutStatus::Reversed => "reversed",
            CashOutStatus::Confirmed => "confirmed",
            CashOutStatus::Internal => "internal",
            CashOutStatus::Forced => "forced",
        }
    }
}

impl fmt::Display for CashOutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-bit flags stored on a cash-out record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CashOutFlag {
    /// Hooks are configured for the identifier and must be consulted
    SomeHookRegistered = 0,
}

impl CashOutFlag {
    /// Bit mask of the flag inside `CashOut::flags`
    #[inline]
    pub fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// Cash-out record as stored by a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CashOut {
    /// Pinned account
    pub account: Address,

    /// Amount of the latest registration
    pub amount: Amount,

    /// Current status
    pub status: CashOutStatus,

    /// Flag bits, see [`CashOutFlag`]
    pub flags: u8,
}

impl CashOut {
    /// Whether the given flag bit is set
    pub fn has_flag(&self, flag: CashOutFlag) -> bool {
        self.flags & flag.mask() != 0
    }

    /// Whether hook dispatch must be consulted for this record
    pub fn has_hooks(&self) -> bool {
        self.has_flag(CashOutFlag::SomeHookRegistered)
    }
}
