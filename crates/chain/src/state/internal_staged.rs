//! Staged mutation buffers shared by every sub-ledger.
//!
//! ```text
//!   put(k, v)      del.remove(k); add.insert(k, v)
//!   delete(k)      add.remove(k); del.insert(k)
//!   get(k)         del ? None : add[k] ?? current[k]
//!   commit()       current += add; current -= del; clear
//!   abort()        clear
//!   begin()        journal later put/delete
//!   rollback()     replay the journal backwards
//! ```
//!
//! Nothing here touches the store. `stage_writes` turns the pending buffers
//! into batch ops, which the ledger applies before calling `commit`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::codec::{self, CodecError};
use crate::db::{KvStore, WriteBatch};
use crate::error::LedgerResult;

/// Pending add/delete buffers of a [`StagedMap`].
///
/// Writes go through [`put`](Pending::put) and [`delete`](Pending::delete) so
/// that an open transaction can journal them. `rollback` replays the journal
/// backwards; its cost is the number of writes the failed tx made.
#[derive(Debug, Clone)]
pub struct Pending<K: Ord, V> {
    pub add: BTreeMap<K, V>,
    pub del: BTreeSet<K>,
    undo: Option<Vec<Undo<K, V>>>,
}

/// Pending state of one key as it was before a journaled write.
#[derive(Debug, Clone)]
struct Undo<K, V> {
    key: K,
    add: Option<V>,
    del: bool,
}

impl<K: Ord, V> Default for Pending<K, V> {
    fn default() -> Self {
        Pending { add: BTreeMap::new(), del: BTreeSet::new(), undo: None }
    }
}

impl<K: Ord, V> Pending<K, V> {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.del.is_empty()
    }

    pub fn clear(&mut self) {
        self.add.clear();
        self.del.clear();
        self.undo = None;
    }

    /// Start journaling writes.
    pub fn begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    /// Keep the writes made since `begin`.
    pub fn release(&mut self) {
        self.undo = None;
    }
}

impl<K: Ord + Clone, V: Clone> Pending<K, V> {
    fn record(&mut self, key: &K) {
        if let Some(undo) = self.undo.as_mut() {
            undo.push(Undo { key: key.clone(), add: self.add.get(key).cloned(), del: self.del.contains(key) });
        }
    }

    pub fn put(&mut self, key: K, value: V) {
        self.record(&key);
        self.del.remove(&key);
        self.add.insert(key, value);
    }

    pub fn delete(&mut self, key: &K) {
        self.record(key);
        self.add.remove(key);
        self.del.insert(key.clone());
    }

    /// Undo the writes made since `begin`, newest first.
    pub fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else { return };
        for entry in undo.into_iter().rev() {
            match entry.add {
                Some(v) => {
                    self.add.insert(entry.key.clone(), v);
                }
                None => {
                    self.add.remove(&entry.key);
                }
            }
            if entry.del {
                self.del.insert(entry.key);
            } else {
                self.del.remove(&entry.key);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct StagedMap<K: Ord, V> {
    current: BTreeMap<K, V>,
    pending: Pending<K, V>,
}

impl<K: Ord, V> Default for StagedMap<K, V> {
    fn default() -> Self {
        StagedMap { current: BTreeMap::new(), pending: Pending::default() }
    }
}

impl<K: Ord + Clone, V: Clone> StagedMap<K, V> {
    pub fn new() -> Self { Self::default() }

    /// Drop committed state ahead of a rescan (reload path).
    pub fn clear_current(&mut self) {
        self.current.clear();
    }

    /// Seed committed state (reload path).
    pub fn insert_current(&mut self, key: K, value: V) {
        self.current.insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        if self.pending.del.contains(key) {
            return None;
        }
        self.pending.add.get(key).or_else(|| self.current.get(key))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn put(&mut self, key: K, value: V) {
        self.pending.put(key, value);
    }

    pub fn delete(&mut self, key: &K) {
        self.pending.delete(key);
    }

    /// Effective view (pending over current), in key order.
    pub fn entries(&self) -> Vec<(&K, &V)> {
        let mut merged: BTreeMap<&K, &V> = BTreeMap::new();
        for (k, v) in &self.current {
            if !self.pending.del.contains(k) {
                merged.insert(k, v);
            }
        }
        for (k, v) in &self.pending.add {
            merged.insert(k, v);
        }
        merged.into_iter().collect()
    }

    pub fn values(&self) -> Vec<&V> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current(&self) -> &BTreeMap<K, V> {
        &self.current
    }

    pub fn pending(&self) -> &Pending<K, V> {
        &self.pending
    }

    pub fn begin(&mut self) {
        self.pending.begin();
    }

    pub fn rollback(&mut self) {
        self.pending.rollback();
    }

    pub fn release(&mut self) {
        self.pending.release();
    }

    pub fn commit(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (k, v) in pending.add {
            self.current.insert(k, v);
        }
        for k in pending.del {
            self.current.remove(&k);
        }
    }

    pub fn abort(&mut self) {
        self.pending.clear();
    }
}

impl<K: Ord + Clone, V: Clone + Serialize> StagedMap<K, V> {
    /// Queue the pending buffers as store ops.
    pub fn stage_writes<F>(&self, batch: &mut WriteBatch, key_of: F) -> Result<(), CodecError>
    where
        F: Fn(&K) -> Vec<u8>,
    {
        stage_pending(&self.pending, batch, key_of)
    }
}

/// Shared by the staged map and the subscriber cache.
pub(crate) fn stage_pending<K, V, F>(
    pending: &Pending<K, V>,
    batch: &mut WriteBatch,
    key_of: F,
) -> Result<(), CodecError>
where
    K: Ord,
    V: Serialize,
    F: Fn(&K) -> Vec<u8>,
{
    for (k, v) in &pending.add {
        batch.put(key_of(k), codec::encode(v)?);
    }
    for k in &pending.del {
        batch.delete(key_of(k));
    }
    Ok(())
}

/// Decode every record stored under `prefix` (reload path).
pub(crate) fn scan_records<T: DeserializeOwned>(store: &dyn KvStore, prefix: &[u8]) -> LedgerResult<Vec<T>> {
    let mut out = Vec::new();
    for (_, bytes) in store.iter_prefix(prefix)? {
        let (record, _) = codec::decode::<T>(&bytes)?;
        out.push(record);
    }
    Ok(out)
}

// ════════════════════════════════════════════════════════════════════════════
// SUB-LEDGER CONTRACT
// ════════════════════════════════════════════════════════════════════════════

/// Two-phase protocol every sub-ledger exposes to the [`Ledger`](super::Ledger)
/// facade. `begin` opens a single transaction, which ends in either
/// `rollback` or `release`.
pub trait SubLedger {
    fn begin(&mut self);
    fn rollback(&mut self);
    fn release(&mut self);

    /// Queue pending mutations into `batch`. Must not touch in-memory state.
    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError>;

    fn commit(&mut self);
    fn abort(&mut self);
}

// ════════════════════════════════════════════════════════════════════════════
// SINGLETON RECORDS
// ════════════════════════════════════════════════════════════════════════════

/// Single staged record (system params, yield pool, reward checkpoint).
#[derive(Debug, Clone, Default)]
pub struct StagedValue<T> {
    current: T,
    pending: Option<T>,
    // pending as of `begin`, while a tx is open
    saved: Option<Option<T>>,
}

impl<T: Clone> StagedValue<T> {
    pub fn new(current: T) -> Self {
        StagedValue { current, pending: None, saved: None }
    }

    pub fn get(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.current)
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn set(&mut self, value: T) {
        self.pending = Some(value);
    }

    pub fn set_current(&mut self, value: T) {
        self.current = value;
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    pub fn begin(&mut self) {
        self.saved = Some(self.pending.clone());
    }

    pub fn rollback(&mut self) {
        if let Some(pending) = self.saved.take() {
            self.pending = pending;
        }
    }

    pub fn release(&mut self) {
        self.saved = None;
    }

    pub fn commit(&mut self) {
        self.saved = None;
        if let Some(v) = self.pending.take() {
            self.current = v;
        }
    }

    pub fn abort(&mut self) {
        self.saved = None;
        self.pending = None;
    }
}

impl<T: Clone + Serialize> StagedValue<T> {
    pub fn stage_write(&self, batch: &mut WriteBatch, key: Vec<u8>) -> Result<(), CodecError> {
        if let Some(v) = &self.pending {
            batch.put(key, codec::encode(v)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod staged_tests {
    use super::*;

    fn key(k: &u8) -> Vec<u8> {
        vec![*k]
    }

    #[test]
    fn pending_overlays_current() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.insert_current(1, 10);
        m.insert_current(2, 20);
        m.put(1, 11);
        m.delete(&2);
        m.put(3, 30);

        assert_eq!(m.get(&1), Some(&11));
        assert_eq!(m.get(&2), None);
        assert_eq!(m.get(&3), Some(&30));
        assert_eq!(m.values(), vec![&11, &30]);
        // current untouched until commit
        assert_eq!(m.current().get(&1), Some(&10));
    }

    #[test]
    fn clear_current_keeps_pending() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.insert_current(1, 10);
        m.put(2, 20);
        m.clear_current();
        assert_eq!(m.get(&1), None);
        assert_eq!(m.get(&2), Some(&20));
    }

    #[test]
    fn delete_then_put_resurrects() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.insert_current(1, 10);
        m.delete(&1);
        m.put(1, 12);
        m.commit();
        assert_eq!(m.get(&1), Some(&12));
    }

    #[test]
    fn commit_is_union_minus_deletes() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.insert_current(1, 10);
        m.insert_current(2, 20);
        m.put(3, 30);
        m.delete(&1);
        m.commit();
        assert_eq!(m.current().len(), 2);
        assert!(m.current().get(&1).is_none());
        assert!(m.pending().is_empty());
    }

    #[test]
    fn abort_restores_previous_view() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.insert_current(1, 10);
        let before: Vec<(u8, u64)> = m.entries().into_iter().map(|(k, v)| (*k, *v)).collect();
        m.put(1, 99);
        m.delete(&1);
        m.put(5, 50);
        m.abort();
        let after: Vec<(u8, u64)> = m.entries().into_iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn rollback_undoes_partial_work() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.insert_current(3, 30);
        m.put(1, 1);
        m.delete(&4);
        m.begin();
        m.put(2, 2);
        m.delete(&1);
        m.put(1, 5);
        m.delete(&3);
        m.put(4, 40);
        m.rollback();
        assert_eq!(m.get(&1), Some(&1));
        assert_eq!(m.get(&2), None);
        assert_eq!(m.get(&3), Some(&30));
        assert_eq!(m.get(&4), None);
        assert!(m.pending().del.contains(&4));
        assert_eq!(m.pending().add.len(), 1);
    }

    #[test]
    fn release_keeps_work_and_stops_journaling() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.begin();
        m.put(1, 1);
        m.release();
        // no tx open: nothing to undo
        m.put(2, 2);
        m.rollback();
        assert_eq!(m.get(&1), Some(&1));
        assert_eq!(m.get(&2), Some(&2));
    }

    #[test]
    fn staged_value_rollback() {
        let mut v = StagedValue::new(1u64);
        v.set(2);
        v.begin();
        v.set(3);
        v.rollback();
        assert_eq!(*v.get(), 2);
        v.begin();
        v.set(4);
        v.release();
        assert_eq!(*v.get(), 4);
    }

    #[test]
    fn stage_writes_emits_puts_and_deletes() {
        let mut m: StagedMap<u8, u64> = StagedMap::new();
        m.insert_current(1, 10);
        m.put(2, 20);
        m.delete(&1);
        let mut batch = WriteBatch::new();
        m.stage_writes(&mut batch, key).expect("stage");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[0], crate::db::BatchOp::Put(vec![2], codec::encode(&20u64).expect("enc")));
        assert_eq!(batch.ops()[1], crate::db::BatchOp::Delete(vec![1]));
    }

    #[test]
    fn staged_value_commit_and_abort() {
        let mut v = StagedValue::new(1u64);
        v.set(2);
        assert_eq!(*v.get(), 2);
        v.abort();
        assert_eq!(*v.get(), 1);
        v.set(3);
        v.commit();
        assert_eq!(*v.current(), 3);
        assert!(!v.is_dirty());
    }
}
