//! CSV format handling for operator commands and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `CommandCsvRecord` structure for deserialization
//! - Conversion from CSV records to [`Command`]s, including decimal amount
//!   conversion to base units
//! - Account output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{checked_amount, Account, Address, Amount, Command, CommandKind, TxId};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns:
/// `command, account, counterparty, amount, tx, release_time`.
/// Which optional columns are required depends on the command.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CommandCsvRecord {
    pub command: String,
    pub account: Option<String>,
    pub counterparty: Option<String>,
    pub amount: Option<String>,
    pub tx: String,
    pub release_time: Option<u64>,
}

/// Non-empty, trimmed value of an optional column
fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn require<'a>(value: &'a Option<String>, column: &str, record: &CommandCsvRecord) -> Result<&'a str, String> {
    present(value).ok_or_else(|| {
        format!(
            "{} command for tx {} requires the '{}' column",
            record.command.trim(),
            record.tx,
            column
        )
    })
}

fn require_address(value: &Option<String>, column: &str, record: &CommandCsvRecord) -> Result<Address, String> {
    Address::from_str(require(value, column, record)?)
}

fn require_release_time(record: &CommandCsvRecord) -> Result<u64, String> {
    record.release_time.ok_or_else(|| {
        format!(
            "{} command for tx {} requires the 'release_time' column",
            record.command.trim(),
            record.tx
        )
    })
}

/// Convert a decimal amount string into base units
///
/// `"1.25"` with 2 decimals becomes `125`. Negative values, values with more
/// fractional digits than `decimals`, zero and values above `u64::MAX` base
/// units are rejected.
///
/// # Arguments
///
/// * `raw` - Decimal string as found in the CSV
/// * `decimals` - Number of fractional digits of one token
pub fn to_base_units(raw: &str, decimals: u32) -> Result<Amount, String> {
    let value = Decimal::from_str(raw.trim()).map_err(|_| format!("Invalid amount '{}'", raw))?;
    if value.is_sign_negative() {
        return Err(format!("Negative amount '{}'", raw));
    }

    let scale = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| format!("Unsupported number of decimals: {}", decimals))?;
    let scaled = value
        .checked_mul(scale)
        .ok_or_else(|| format!("Amount '{}' is out of range", raw))?;
    if !scaled.fract().is_zero() {
        return Err(format!(
            "Amount '{}' has more than {} fractional digits",
            raw, decimals
        ));
    }

    let units = scaled
        .to_u128()
        .ok_or_else(|| format!("Amount '{}' is out of range", raw))?;
    checked_amount(units).map_err(|e| format!("Amount '{}': {}", raw, e))
}

/// Render base units as a decimal string with `decimals` fractional digits
pub fn format_base_units(amount: Amount, decimals: u32) -> Result<String, String> {
    Decimal::try_from_i128_with_scale(i128::from(amount), decimals)
        .map(|value| value.to_string())
        .map_err(|e| format!("Cannot render amount {}: {}", amount, e))
}

/// Convert a CommandCsvRecord to a Command
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
/// * `decimals` - Fractional digits used by the `amount` column
///
/// # Returns
///
/// Result containing either:
/// - Ok(Command) - Successfully converted command
/// - Err(String) - Error message describing the conversion failure
pub fn convert_command_record(record: CommandCsvRecord, decimals: u32) -> Result<Command, String> {
    let kind = CommandKind::from_str(&record.command)
        .map_err(|e| format!("{} for tx {}", e, record.tx))?;
    let tx_id = TxId::from_str(&record.tx)?;
    let amount = || {
        require(&record.amount, "amount", &record).and_then(|raw| to_base_units(raw, decimals))
    };

    let command = match kind {
        CommandKind::CashIn => Command::CashIn {
            account: require_address(&record.account, "account", &record)?,
            amount: amount()?,
            tx_id,
        },
        CommandKind::CashInPremint => Command::CashInPremint {
            account: require_address(&record.account, "account", &record)?,
            amount: amount()?,
            tx_id,
            release_time: require_release_time(&record)?,
        },
        CommandKind::PremintRevoke => Command::PremintRevoke {
            tx_id,
            release_time: require_release_time(&record)?,
        },
        CommandKind::PremintUpdate => Command::PremintUpdate {
            amount: amount()?,
            tx_id,
            release_time: require_release_time(&record)?,
        },
        CommandKind::Request => Command::RequestCashOut {
            account: require_address(&record.account, "account", &record)?,
            amount: amount()?,
            tx_id,
        },
        CommandKind::Confirm => Command::ConfirmCashOut { tx_id },
        CommandKind::Reverse => Command::ReverseCashOut { tx_id },
        CommandKind::Internal => Command::InternalCashOut {
            from: require_address(&record.account, "account", &record)?,
            to: require_address(&record.counterparty, "counterparty", &record)?,
            amount: amount()?,
            tx_id,
        },
        CommandKind::Force => Command::ForcedCashOut {
            from: require_address(&record.account, "account", &record)?,
            amount: amount()?,
            tx_id,
        },
    };
    Ok(command)
}

/// Write account states to CSV format
///
/// Writes accounts with columns: account, balance, cash_out_balance.
/// Accounts are sorted by address for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Slice of account states to write
/// * `decimals` - Fractional digits used to render amounts
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_csv(
    accounts: &[Account],
    decimals: u32,
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "balance", "cash_out_balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.address);

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.address.to_string(),
                format_base_units(account.balance, decimals)?,
                format_base_units(account.cash_out_balance, decimals)?,
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
