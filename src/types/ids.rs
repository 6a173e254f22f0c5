//! Identifier types for the cashier
//!
//! Off-chain transaction identifiers and batch identifiers are fixed-width
//! 32-byte keys; accounts (and shard/coordinator/hook identities) are 20-byte
//! addresses. All of them render as `0x`-prefixed lowercase hex and parse from
//! hex with an optional `0x` prefix, left-padding short inputs with zeros.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Token amount in base units
///
/// Amounts must fit 64 bits; the ceiling is enforced by the type.
pub type Amount = u64;

/// Release timestamp of a premint (seconds); zero is not a valid release time
pub type ReleaseTime = u64;

/// Parse a hex string into a fixed-width byte array, left-padding with zeros
fn parse_fixed_hex<const N: usize>(input: &str, kind: &str) -> Result<[u8; N], String> {
    let digits = input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim());

    if digits.is_empty() {
        return Err(format!("Empty {} value", kind));
    }
    if digits.len() > N * 2 {
        return Err(format!(
            "{} '{}' is longer than {} hex digits",
            kind,
            input,
            N * 2
        ));
    }

    let padded = format!("{:0>width$}", digits, width = N * 2);
    let mut bytes = [0u8; N];
    hex::decode_to_slice(&padded, &mut bytes)
        .map_err(|e| format!("Invalid {} '{}': {}", kind, input, e))?;
    Ok(bytes)
}

macro_rules! fixed_hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// The all-zero value, never valid as an operation argument
            pub const ZERO: Self = Self([0u8; $len]);

            /// Whether every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|byte| *byte == 0)
            }

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl From<u64> for $name {
            /// Build a value whose trailing eight bytes hold `value` (big-endian)
            fn from(value: u64) -> Self {
                let mut bytes = [0u8; $len];
                bytes[$len - 8..].copy_from_slice(&value.to_be_bytes());
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_fixed_hex::<$len>(s, $kind).map(Self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_hex_id!(
    /// Off-chain transaction identifier (32 bytes, globally unique key)
    TxId,
    32,
    "transaction id"
);

fixed_hex_id!(
    /// Correlation identifier of a cash-in batch (32 bytes)
    BatchId,
    32,
    "batch id"
);

fixed_hex_id!(
    /// Account, coordinator, shard or hook-target address (20 bytes)
    Address,
    20,
    "address"
);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::short("0x1", 1)]
    #[case::no_prefix("ff", 255)]
    #[case::upper_prefix("0X10", 16)]
    #[case::padded_whitespace("  0x2a  ", 42)]
    fn test_address_parse_left_pads(#[case] input: &str, #[case] expected: u64) {
        let address: Address = input.parse().unwrap();
        assert_eq!(address, Address::from(expected));
    }

    #[rstest]
    #[case::empty("")]
    #[case::prefix_only("0x")]
    #[case::not_hex("0xzz")]
    #[case::too_long("0x000000000000000000000000000000000000000001")]
    fn test_address_parse_errors(#[case] input: &str) {
        assert!(input.parse::<Address>().is_err());
    }

    #[test]
    fn test_display_is_full_width_hex() {
        assert_eq!(
            Address::from(1).to_string(),
            "0x0000000000000000000000000000000000000001"
        );
        assert_eq!(TxId::from(0xabc).to_string().len(), 2 + 64);
        assert!(TxId::from(0xabc).to_string().ends_with("0abc"));
    }

    #[test]
    fn test_zero_detection() {
        assert!(TxId::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!BatchId::from(7).is_zero());
    }

    #[test]
    fn test_display_parse_agree() {
        let id = TxId::from(0xdead_beef);
        let parsed: TxId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
