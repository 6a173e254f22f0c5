//! Reference permission service and suspend switch

use crate::core::traits::{PermissionService, SuspendGate};
use crate::types::{Address, Capability};
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Capability grants keyed by `(account, capability)`
#[derive(Debug, Default)]
pub struct RoleTable {
    grants: DashSet<(Address, Capability)>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, account: Address, capability: Capability) {
        info!(account = %account, capability = %capability, "capability granted");
        self.grants.insert((account, capability));
    }

    pub fn grant_all(&self, account: Address) {
        for capability in Capability::ALL {
            self.grant(account, capability);
        }
    }

    pub fn revoke(&self, account: Address, capability: Capability) {
        info!(account = %account, capability = %capability, "capability revoked");
        self.grants.remove(&(account, capability));
    }
}

impl PermissionService for RoleTable {
    fn has_privilege(&self, caller: Address, capability: Capability) -> bool {
        self.grants.contains(&(caller, capability))
    }
}

/// Circuit breaker over an atomic flag
#[derive(Debug, Default)]
pub struct SuspendSwitch {
    suspended: AtomicBool,
}

impl SuspendSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Release);
    }
}

impl SuspendGate for SuspendSwitch {
    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }
}
