//! Capabilities checked against the permission service

use std::fmt;

/// Privilege a caller needs for a coordinator operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Shard registry administration and shard trust delegation
    Owner,

    /// Cash-in and cash-out lifecycle operations
    Cashier,

    /// Hook configuration and hook target registration
    HookAdmin,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Owner, Capability::Cashier, Capability::HookAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Owner => "owner",
            Capability::Cashier => "cashier",
            Capability::HookAdmin => "hook_admin",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
