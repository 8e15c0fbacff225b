//! # Subscriber Registry
//!
//! Paying end users, keyed by address. Committed records live in a bounded
//! LRU cache in front of the store; staged writes are kept outside the cache
//! so eviction never loses an unflushed mutation.
//!
//! ```text
//!   get(addr):  pending.del ─► None
//!               pending.add ─► record
//!               cache       ─► record (promoted)
//!               store       ─► record (cached on the way out)
//! ```
//!
//! Reload warms the cache with at most half its capacity.

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use tracing::debug;

use crate::codec::{self, CodecError};
use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{Address, TxId, SECONDS_MINUTE, SECONDS_MONTH};

use super::internal_staged::{stage_pending, Pending, SubLedger};
use super::internal_state_layout::{user_key, user_prefix};
use super::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub start_time: u64,
    pub end_time: u64,
    pub connections: u64,
    pub pay_amount: u64,
    pub tx_ids: Vec<TxId>,
    pub user_type: u64,
    pub address: Address,
}

#[derive(Debug)]
pub struct SubscriberRegistry {
    cache: Mutex<LruCache<Address, SubscriberRecord>>,
    capacity: usize,
    pending: Pending<Address, SubscriberRecord>,
}

impl SubscriberRegistry {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        SubscriberRegistry {
            cache: Mutex::new(LruCache::new(cap)),
            capacity: cap.get(),
            pending: Pending::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<usize> {
        let limit = (self.capacity / 2).max(1);
        let mut cache = self.cache.lock();
        cache.clear();
        let mut n = 0;
        for (_, bytes) in store.iter_prefix(&user_prefix())? {
            if n >= limit {
                break;
            }
            let (record, _) = codec::decode::<SubscriberRecord>(&bytes)?;
            cache.put(record.address, record);
            n += 1;
        }
        debug!(count = n, limit, "reload users");
        Ok(n)
    }

    pub fn get(&self, store: &dyn KvStore, address: &Address) -> LedgerResult<Option<SubscriberRecord>> {
        if self.pending.del.contains(address) {
            return Ok(None);
        }
        if let Some(r) = self.pending.add.get(address) {
            return Ok(Some(r.clone()));
        }
        let mut cache = self.cache.lock();
        if let Some(r) = cache.get(address) {
            return Ok(Some(r.clone()));
        }
        match store.get(&user_key(address))? {
            Some(bytes) => {
                let (record, _) = codec::decode::<SubscriberRecord>(&bytes)?;
                cache.put(*address, record.clone());
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn put_user(&mut self, record: SubscriberRecord) {
        self.pending.put(record.address, record);
    }

    pub fn del_user(&mut self, address: &Address) {
        self.pending.delete(address);
    }

    /// Every subscriber: committed rows from the store with staged writes on top.
    pub fn users(&self, store: &dyn KvStore) -> LedgerResult<Vec<SubscriberRecord>> {
        let mut merged: BTreeMap<Address, SubscriberRecord> = BTreeMap::new();
        for (_, bytes) in store.iter_prefix(&user_prefix())? {
            let (record, _) = codec::decode::<SubscriberRecord>(&bytes)?;
            merged.insert(record.address, record);
        }
        for addr in &self.pending.del {
            merged.remove(addr);
        }
        for (addr, r) in &self.pending.add {
            merged.insert(*addr, r.clone());
        }
        Ok(merged.into_values().collect())
    }
}

impl SubLedger for SubscriberRegistry {
    fn begin(&mut self) { self.pending.begin() }
    fn rollback(&mut self) { self.pending.rollback() }
    fn release(&mut self) { self.pending.release() }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        stage_pending(&self.pending, batch, user_key)
    }

    fn commit(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let cache = self.cache.get_mut();
        for (addr, record) in pending.add {
            cache.put(addr, record);
        }
        for addr in pending.del {
            cache.pop(&addr);
        }
    }

    fn abort(&mut self) {
        self.pending.clear();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER WORKFLOWS
// ════════════════════════════════════════════════════════════════════════════

impl Ledger {
    /// Payment must cover whole months and match the tier fee exactly.
    pub fn check_pay_amount(&self, user_type: u64, amount: u64, start_time: u64, end_time: u64) -> bool {
        if end_time < start_time || (end_time - start_time) % SECONDS_MONTH != 0 {
            return false;
        }
        self.user_types.check_fee(user_type, amount)
    }

    /// Store (or extend) the subscription and feed the yield pool with the
    /// unburned part of the payment.
    pub fn deal_add_user_tx(&mut self, tx_id: TxId, block_time: u64, mut user: SubscriberRecord) -> LedgerResult<()> {
        if let Some(prev) = self.users.get(self.store.as_ref(), &user.address)? {
            if user.start_time + SECONDS_MINUTE < prev.end_time {
                return Err(LedgerError::StartTime);
            }
            if user.start_time <= prev.end_time + SECONDS_MINUTE {
                // renewal: the window continues the previous one
                user.start_time = prev.start_time;
            }
            user.tx_ids = prev.tx_ids;
        }
        user.tx_ids.push(tx_id);

        let burn = self.sys_params.params().burn_perc.min(100) as u64;
        let to_yield = user.pay_amount.saturating_mul(100 - burn) / 100;
        debug!(address = %user.address, pay = user.pay_amount, to_yield, "subscriber stored");
        self.users.put_user(user);
        self.yields.modify_yields(to_yield, tx_id, block_time)
    }
}

#[cfg(test)]
mod subscriber_tests {
    use super::*;
    use crate::db::MemoryStore;

    fn rec(b: u8, end: u64) -> SubscriberRecord {
        SubscriberRecord {
            start_time: 0,
            end_time: end,
            connections: 1,
            pay_amount: 100,
            tx_ids: vec![],
            user_type: 1,
            address: Address::from_bytes([b; 20]),
        }
    }

    fn flush(reg: &mut SubscriberRegistry, store: &MemoryStore) {
        let mut batch = WriteBatch::new();
        reg.stage_writes(&mut batch).expect("stage");
        store.write(batch).expect("write");
        reg.commit();
    }

    #[test]
    fn eviction_falls_back_to_store() {
        let store = MemoryStore::new();
        let mut reg = SubscriberRegistry::new(2);
        for b in 1..=4u8 {
            reg.put_user(rec(b, 10));
        }
        flush(&mut reg, &store);
        assert_eq!(reg.cached_len(), 2);
        let first = reg.get(&store, &Address::from_bytes([1; 20])).expect("get");
        assert_eq!(first.map(|r| r.end_time), Some(10));
    }

    #[test]
    fn pending_delete_hides_cached_record() {
        let store = MemoryStore::new();
        let mut reg = SubscriberRegistry::new(8);
        reg.put_user(rec(1, 10));
        flush(&mut reg, &store);
        let a = Address::from_bytes([1; 20]);
        reg.del_user(&a);
        assert!(reg.get(&store, &a).expect("get").is_none());
        reg.abort();
        assert!(reg.get(&store, &a).expect("get").is_some());
    }

    #[test]
    fn reload_warms_half_capacity() {
        let store = MemoryStore::new();
        let mut reg = SubscriberRegistry::new(4);
        for b in 1..=4u8 {
            reg.put_user(rec(b, 10));
        }
        flush(&mut reg, &store);

        let mut fresh = SubscriberRegistry::new(4);
        assert_eq!(fresh.reload(&store).expect("reload"), 2);
        assert_eq!(fresh.users(&store).expect("users").len(), 4);
    }
}
