//! Enumerable set of pending cash-out identifiers
//!
//! Insert and remove are O(1). Removal moves the last element into the freed
//! slot, so range reads are only stable between mutations.

use crate::types::TxId;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct PendingSet {
    items: Vec<TxId>,
    positions: HashMap<TxId, usize>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx_id`; returns `false` if it was already present
    pub fn insert(&mut self, tx_id: TxId) -> bool {
        if self.positions.contains_key(&tx_id) {
            return false;
        }
        self.positions.insert(tx_id, self.items.len());
        self.items.push(tx_id);
        true
    }

    /// Remove `tx_id`; returns `false` if it was absent
    pub fn remove(&mut self, tx_id: &TxId) -> bool {
        let Some(position) = self.positions.remove(tx_id) else {
            return false;
        };
        self.items.swap_remove(position);
        if let Some(moved) = self.items.get(position) {
            self.positions.insert(*moved, position);
        }
        true
    }

    pub fn contains(&self, tx_id: &TxId) -> bool {
        self.positions.contains_key(tx_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Identifiers in `[offset, offset + limit)`, clamped to the set length
    pub fn range(&self, offset: usize, limit: usize) -> Vec<TxId> {
        self.items.iter().skip(offset).take(limit).copied().collect()
    }
}
