//! Operator commands replayed against a coordinator
//!
//! A command is the parsed, base-unit form of one input CSV row. Commands are
//! always executed by the configured operator.

use super::ids::{Address, Amount, ReleaseTime, TxId};
use std::fmt;
use std::str::FromStr;

/// Command kind as named in the `command` CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    CashIn,
    CashInPremint,
    PremintRevoke,
    PremintUpdate,
    Request,
    Confirm,
    Reverse,
    Internal,
    Force,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::CashIn => "cash_in",
            CommandKind::CashInPremint => "cash_in_premint",
            CommandKind::PremintRevoke => "premint_revoke",
            CommandKind::PremintUpdate => "premint_update",
            CommandKind::Request => "request",
            CommandKind::Confirm => "confirm",
            CommandKind::Reverse => "reverse",
            CommandKind::Internal => "internal",
            CommandKind::Force => "force",
        };
        f.write_str(name)
    }
}

impl FromStr for CommandKind {
    type Err = String;

    /// Parse a command name, ignoring ASCII case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash_in" => Ok(CommandKind::CashIn),
            "cash_in_premint" => Ok(CommandKind::CashInPremint),
            "premint_revoke" => Ok(CommandKind::PremintRevoke),
            "premint_update" => Ok(CommandKind::PremintUpdate),
            "request" => Ok(CommandKind::Request),
            "confirm" => Ok(CommandKind::Confirm),
            "reverse" => Ok(CommandKind::Reverse),
            "internal" => Ok(CommandKind::Internal),
            "force" => Ok(CommandKind::Force),
            other => Err(format!("Unknown command '{}'", other)),
        }
    }
}

/// A single coordinator operation with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CashIn {
        account: Address,
        amount: Amount,
        tx_id: TxId,
    },
    CashInPremint {
        account: Address,
        amount: Amount,
        tx_id: TxId,
        release_time: ReleaseTime,
    },
    PremintRevoke {
        tx_id: TxId,
        release_time: ReleaseTime,
    },
    PremintUpdate {
        amount: Amount,
        tx_id: TxId,
        release_time: ReleaseTime,
    },
    RequestCashOut {
        account: Address,
        amount: Amount,
        tx_id: TxId,
    },
    ConfirmCashOut {
        tx_id: TxId,
    },
    ReverseCashOut {
        tx_id: TxId,
    },
    InternalCashOut {
        from: Address,
        to: Address,
        amount: Amount,
        tx_id: TxId,
    },
    ForcedCashOut {
        from: Address,
        amount: Amount,
        tx_id: TxId,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CashIn { .. } => CommandKind::CashIn,
            Command::CashInPremint { .. } => CommandKind::CashInPremint,
            Command::PremintRevoke { .. } => CommandKind::PremintRevoke,
            Command::PremintUpdate { .. } => CommandKind::PremintUpdate,
            Command::RequestCashOut { .. } => CommandKind::Request,
            Command::ConfirmCashOut { .. } => CommandKind::Confirm,
            Command::ReverseCashOut { .. } => CommandKind::Reverse,
            Command::InternalCashOut { .. } => CommandKind::Internal,
            Command::ForcedCashOut { .. } => CommandKind::Force,
        }
    }

    pub fn tx_id(&self) -> TxId {
        match self {
            Command::CashIn { tx_id, .. }
            | Command::CashInPremint { tx_id, .. }
            | Command::PremintRevoke { tx_id, .. }
            | Command::PremintUpdate { tx_id, .. }
            | Command::RequestCashOut { tx_id, .. }
            | Command::ConfirmCashOut { tx_id }
            | Command::ReverseCashOut { tx_id }
            | Command::InternalCashOut { tx_id, .. }
            | Command::ForcedCashOut { tx_id, .. } => *tx_id,
        }
    }
}
