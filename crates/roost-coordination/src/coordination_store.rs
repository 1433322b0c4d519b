//! Sharded map of live coordination records, created lazily on first
//! delivery and reclaimed by the last drainer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use roost_core::EventKey;

use crate::coordination_record::{CoordinationRecord, CoordinationState};

const DEFAULT_SHARD_COUNT: usize = 16;

/// Concurrent fingerprint-to-record map.
///
/// Sharded so unrelated events never contend on a single map lock; the
/// per-record gate is the only place deliveries for the *same* event
/// serialize. Shard locks are held just long enough to look up, insert, or
/// remove an `Arc` handle.
#[derive(Debug)]
pub struct CoordinationStore {
    shards: Vec<Mutex<HashMap<EventKey, Arc<CoordinationRecord>>>>,
}

impl Default for CoordinationStore {
    fn default() -> Self {
        Self::with_shard_count(DEFAULT_SHARD_COUNT)
    }
}

impl CoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard_count(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Mutex::new(HashMap::new()));
        }
        Self { shards }
    }

    fn shard(&self, key: &EventKey) -> &Mutex<HashMap<EventKey, Arc<CoordinationRecord>>> {
        // The fingerprint is a uniform hash already; its first byte picks
        // the shard.
        let index = key.as_bytes()[0] as usize % self.shards.len();
        &self.shards[index]
    }

    /// Returns the live record for `key`, creating it when this is the
    /// first delivery for a new fingerprint. Two racing deliveries for a
    /// brand-new key observe the same record because insertion happens
    /// under the shard lock.
    ///
    /// A poisoned shard is store corruption; callers fail open and process
    /// the delivery uncoordinated.
    pub(crate) fn get_or_insert(&self, key: EventKey) -> Result<Arc<CoordinationRecord>> {
        let mut shard = self
            .shard(&key)
            .lock()
            .map_err(|_| anyhow!("coordination store shard poisoned for event {key}"))?;
        Ok(Arc::clone(
            shard.entry(key).or_insert_with(|| CoordinationRecord::new(key)),
        ))
    }

    /// Drops the record for `key`. Called by the last drainer while still
    /// holding the record's gate.
    pub(crate) fn remove(&self, key: &EventKey) -> Result<()> {
        let mut shard = self
            .shard(key)
            .lock()
            .map_err(|_| anyhow!("coordination store shard poisoned for event {key}"))?;
        shard.remove(key);
        Ok(())
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.shard(key)
            .lock()
            .map(|shard| shard.contains_key(key))
            .unwrap_or(false)
    }

    /// Number of live records across all shards.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().map(|map| map.len()).unwrap_or(0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current state of the record for `key`, when the record exists and
    /// its gate is free. Diagnostic accessor for tests and operational
    /// inspection; never blocks on a held gate.
    pub fn peek_state(&self, key: &EventKey) -> Option<CoordinationState> {
        let record = {
            let shard = self.shard(key).lock().ok()?;
            Arc::clone(shard.get(key)?)
        };
        let body = record.try_acquire()?;
        Some(body.state)
    }
}
