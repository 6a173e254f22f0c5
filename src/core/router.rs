//! Shard registry and deterministic transaction routing
//!
//! A transaction identifier is routed by hashing it with BLAKE3 and reducing
//! the first eight bytes (little-endian) modulo the current shard count.
//! Growing the registry therefore changes where identifiers route; records
//! created under a different count are only reachable again with that count.

use crate::core::traits::Shard;
use crate::types::{Address, CashierError, TxId};
use std::sync::Arc;

/// Maximum number of shards a registry may hold
pub const MAX_SHARD_COUNT: usize = 1100;

/// Compute the shard index for a transaction identifier
///
/// # Returns
///
/// `None` when `shard_count` is zero
pub fn shard_index(tx_id: &TxId, shard_count: usize) -> Option<usize> {
    if shard_count == 0 {
        return None;
    }
    let hash = blake3::hash(tx_id.as_bytes());
    let bytes = hash.as_bytes();
    let hash_value = u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]);
    Some((hash_value % shard_count as u64) as usize)
}

/// Ordered registry of shards
pub struct ShardRouter {
    shards: Vec<Arc<dyn Shard>>,
    max_shard_count: usize,
}

impl ShardRouter {
    /// Create an empty registry
    ///
    /// # Arguments
    ///
    /// * `max_shard_count` - Upper bound on the registry length
    pub fn new(max_shard_count: usize) -> Self {
        Self {
            shards: Vec::new(),
            max_shard_count,
        }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn max_shard_count(&self) -> usize {
        self.max_shard_count
    }

    pub fn shards(&self) -> &[Arc<dyn Shard>] {
        &self.shards
    }

    /// Index of the shard responsible for `tx_id`
    pub fn route(&self, tx_id: &TxId) -> Result<usize, CashierError> {
        shard_index(tx_id, self.shards.len()).ok_or(CashierError::ShardCountZero)
    }

    /// Shard responsible for `tx_id`
    pub fn shard_for(&self, tx_id: &TxId) -> Result<Arc<dyn Shard>, CashierError> {
        let index = self.route(tx_id)?;
        Ok(Arc::clone(&self.shards[index]))
    }

    /// Append shards to the registry
    ///
    /// Nothing is appended if the resulting length would exceed the maximum.
    pub fn add_shards(&mut self, shards: Vec<Arc<dyn Shard>>) -> Result<(), CashierError> {
        let requested = self.shards.len() + shards.len();
        if requested > self.max_shard_count {
            return Err(CashierError::ShardCountExcess {
                requested,
                max: self.max_shard_count,
            });
        }
        self.shards.extend(shards);
        Ok(())
    }

    /// Overwrite a contiguous range starting at `start`
    ///
    /// # Returns
    ///
    /// The replaced shards, in order
    pub fn replace_shards(
        &mut self,
        start: usize,
        shards: Vec<Arc<dyn Shard>>,
    ) -> Result<Vec<Arc<dyn Shard>>, CashierError> {
        let count = shards.len();
        let end = start
            .checked_add(count)
            .filter(|end| *end <= self.shards.len())
            .ok_or(CashierError::ShardReplacementOutOfBounds {
                start,
                count,
                len: self.shards.len(),
            })?;
        Ok(self.shards.splice(start..end, shards).collect())
    }

    /// Addresses of the shards in `[offset, offset + limit)`, clamped to the registry
    pub fn range(&self, offset: usize, limit: usize) -> Vec<Address> {
        self.shards
            .iter()
            .skip(offset)
            .take(limit)
            .map(|shard| shard.address())
            .collect()
    }
}
