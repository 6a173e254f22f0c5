//! Cash-out hook types
//!
//! A hook configuration pairs a callable target with a bitmask selecting which
//! lifecycle points trigger a callback. Only bits 6 through 11 are meaningful.

use super::ids::Address;
use std::fmt;

/// Lifecycle point at which a hook may fire
///
/// The discriminant is the bit position inside [`HookFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HookIndex {
    CashOutRequestBefore = 6,
    CashOutRequestAfter = 7,
    CashOutConfirmBefore = 8,
    CashOutConfirmAfter = 9,
    CashOutReverseBefore = 10,
    CashOutReverseAfter = 11,
}

impl HookIndex {
    /// All hook indices in ascending bit order
    pub const ALL: [HookIndex; 6] = [
        HookIndex::CashOutRequestBefore,
        HookIndex::CashOutRequestAfter,
        HookIndex::CashOutConfirmBefore,
        HookIndex::CashOutConfirmAfter,
        HookIndex::CashOutReverseBefore,
        HookIndex::CashOutReverseAfter,
    ];

    /// Bit position inside [`HookFlags`]
    #[inline]
    pub fn bit(self) -> u8 {
        self as u8
    }

    pub fn from_bit(bit: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|index| index.bit() == bit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookIndex::CashOutRequestBefore => "request_before",
            HookIndex::CashOutRequestAfter => "request_after",
            HookIndex::CashOutConfirmBefore => "confirm_before",
            HookIndex::CashOutConfirmAfter => "confirm_after",
            HookIndex::CashOutReverseBefore => "reverse_before",
            HookIndex::CashOutReverseAfter => "reverse_after",
        }
    }
}

impl fmt::Display for HookIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.bit())
    }
}

/// Bitmask of hook indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HookFlags(u16);

impl HookFlags {
    /// No hooks
    pub const EMPTY: Self = Self(0);

    /// Every bit that may legally be set (indices 6..=11)
    pub const ALLOWED_MASK: u16 = 0b1111_1100_0000;

    /// Every lifecycle point
    pub const ALL: Self = Self(Self::ALLOWED_MASK);

    /// Wrap a raw bitmask without validation
    pub const fn from_bits_retain(bits: u16) -> Self {
        Self(bits)
    }

    /// Wrap a raw bitmask, rejecting bits outside indices 6..=11
    pub fn from_bits(bits: u16) -> Option<Self> {
        (bits & !Self::ALLOWED_MASK == 0).then_some(Self(bits))
    }

    pub fn of(indices: &[HookIndex]) -> Self {
        indices
            .iter()
            .fold(Self::EMPTY, |flags, index| flags.with(*index))
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, index: HookIndex) -> bool {
        self.0 & (1 << index.bit()) != 0
    }

    #[must_use]
    pub fn with(self, index: HookIndex) -> Self {
        Self(self.0 | (1 << index.bit()))
    }

    #[must_use]
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Set indices in ascending bit order; bits outside 6..=11 are ignored
    pub fn iter(&self) -> impl Iterator<Item = HookIndex> + '_ {
        HookIndex::ALL
            .into_iter()
            .filter(move |index| self.contains(*index))
    }
}

impl fmt::Display for HookFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#014b}", self.0)
    }
}

/// Hook configuration for one cash-out identifier
///
/// `target` is zero if and only if `flags` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookConfig {
    pub target: Address,
    pub flags: HookFlags,
}

impl HookConfig {
    pub fn is_empty(&self) -> bool {
        self.target.is_zero() && self.flags.is_empty()
    }
}
