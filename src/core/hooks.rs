//! Cash-out hook dispatch
//!
//! The dispatcher stores, per transaction identifier, the `(target, flags)`
//! pair configured by a hook administrator, plus the table of callable targets
//! keyed by address. Dispatch is fail-closed: an unregistered target or a
//! failing callback aborts the enclosing lifecycle operation.

use crate::core::traits::CashOutHook;
use crate::types::{Address, CashOut, CashierError, CashierEvent, HookConfig, HookFlags, TxId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct HookDispatcher {
    configs: HashMap<TxId, HookConfig>,
    targets: HashMap<Address, Arc<dyn CashOutHook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration stored for `tx_id` (empty if none)
    pub fn config(&self, tx_id: &TxId) -> HookConfig {
        self.configs.get(tx_id).copied().unwrap_or_default()
    }

    /// Store a configuration, returning the previous one
    ///
    /// An empty configuration clears the entry.
    pub fn set_config(&mut self, tx_id: TxId, config: HookConfig) -> HookConfig {
        let previous = if config.is_empty() {
            self.configs.remove(&tx_id)
        } else {
            self.configs.insert(tx_id, config)
        };
        previous.unwrap_or_default()
    }

    /// Add or replace the callable behind `address`
    pub fn register_target(&mut self, address: Address, hook: Arc<dyn CashOutHook>) {
        self.targets.insert(address, hook);
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.targets.contains_key(address)
    }

    /// Fire the configured hooks that belong to `wanted`
    ///
    /// Nothing happens unless the record carries the hook-presence bit. Hooks
    /// fire in ascending index order and each successful call appends a
    /// `HookInvoked` event to `events`.
    ///
    /// # Errors
    ///
    /// * `HookTargetUnregistered` - a hook is due but its target has no callable
    /// * `HookFailed` - the callback vetoed the transition
    pub fn invoke(
        &self,
        tx_id: TxId,
        record: &CashOut,
        wanted: HookFlags,
        events: &mut Vec<CashierEvent>,
    ) -> Result<(), CashierError> {
        if !record.has_hooks() {
            return Ok(());
        }
        let config = self.config(&tx_id);
        let due = config.flags.intersection(wanted);
        if due.is_empty() {
            return Ok(());
        }

        let hook = self
            .targets
            .get(&config.target)
            .ok_or(CashierError::HookTargetUnregistered {
                target: config.target,
            })?;

        for hook_index in due.iter() {
            hook.on_cash_out_hook(hook_index, tx_id)
                .map_err(|e| CashierError::hook_failed(tx_id, hook_index, config.target, e))?;
            debug!(tx_id = %tx_id, hook = %hook_index, target = %config.target, "hook invoked");
            events.push(CashierEvent::HookInvoked {
                tx_id,
                hook_index,
                target: config.target,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_hooks {
    use crate::core::traits::CashOutHook;
    use crate::types::{HookError, HookIndex, TxId};
    use std::sync::Mutex;

    /// Hook that records every call and optionally rejects one index
    #[derive(Default)]
    pub struct RecordingHook {
        pub calls: Mutex<Vec<(HookIndex, TxId)>>,
        pub reject: Option<HookIndex>,
    }

    impl RecordingHook {
        pub fn rejecting(index: HookIndex) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reject: Some(index),
            }
        }

        pub fn indices(&self) -> Vec<HookIndex> {
            self.calls.lock().unwrap().iter().map(|(index, _)| *index).collect()
        }
    }

    impl CashOutHook for RecordingHook {
        fn on_cash_out_hook(&self, hook_index: HookIndex, tx_id: TxId) -> Result<(), HookError> {
            if self.reject == Some(hook_index) {
                return Err(HookError::rejected("vetoed"));
            }
            self.calls.lock().unwrap().push((hook_index, tx_id));
            Ok(())
        }
    }
}
