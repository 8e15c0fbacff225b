//! Account balances, stake balances and the Set value store.
//! Unlike the other sub-ledgers nothing is preloaded: reads fall through the
//! pending overlay to the store.

use std::collections::BTreeMap;

use crate::codec::{self, CodecError};
use crate::crypto::keccak256;
use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::types::Address;

use super::internal_staged::SubLedger;
use super::internal_state_layout::{balance_key, stake_balance_key, value_key};

#[derive(Debug, Clone, Default)]
pub struct AccountPending {
    balances: BTreeMap<Address, u64>,
    stake_balances: BTreeMap<Address, u64>,
    values: BTreeMap<[u8; 32], Vec<u8>>,
    // prior entries, newest last, while a tx is open
    undo: Option<Vec<AccountUndo>>,
}

#[derive(Debug, Clone)]
enum AccountUndo {
    Balance(Address, Option<u64>),
    StakeBalance(Address, Option<u64>),
    Value([u8; 32], Option<Vec<u8>>),
}

fn restore_entry<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(v) => {
            map.insert(key, v);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl AccountPending {
    fn set_balance(&mut self, address: Address, amount: u64) {
        let prior = self.balances.insert(address, amount);
        if let Some(undo) = self.undo.as_mut() {
            undo.push(AccountUndo::Balance(address, prior));
        }
    }

    fn set_stake_balance(&mut self, address: Address, amount: u64) {
        let prior = self.stake_balances.insert(address, amount);
        if let Some(undo) = self.undo.as_mut() {
            undo.push(AccountUndo::StakeBalance(address, prior));
        }
    }

    fn set_value(&mut self, hash: [u8; 32], value: Vec<u8>) {
        let prior = self.values.insert(hash, value);
        if let Some(undo) = self.undo.as_mut() {
            undo.push(AccountUndo::Value(hash, prior));
        }
    }

    fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else { return };
        for entry in undo.into_iter().rev() {
            match entry {
                AccountUndo::Balance(a, prior) => restore_entry(&mut self.balances, a, prior),
                AccountUndo::StakeBalance(a, prior) => restore_entry(&mut self.stake_balances, a, prior),
                AccountUndo::Value(h, prior) => restore_entry(&mut self.values, h, prior),
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Accounts {
    pending: AccountPending,
}

fn read_u64(store: &dyn KvStore, key: &[u8]) -> LedgerResult<u64> {
    match store.get(key)? {
        Some(bytes) => Ok(codec::decode::<u64>(&bytes)?.0),
        None => Ok(0),
    }
}

fn apply_delta(cur: u64, add: bool, amount: u64) -> LedgerResult<u64> {
    if add {
        cur.checked_add(amount).ok_or(LedgerError::Overflow)
    } else {
        cur.checked_sub(amount).ok_or(LedgerError::InsufficientFunds)
    }
}

impl Accounts {
    pub fn new() -> Self { Self::default() }

    pub fn balance(&self, store: &dyn KvStore, address: &Address) -> LedgerResult<u64> {
        match self.pending.balances.get(address) {
            Some(b) => Ok(*b),
            None => read_u64(store, &balance_key(address)),
        }
    }

    pub fn set_balance(&mut self, address: Address, amount: u64) {
        self.pending.set_balance(address, amount);
    }

    /// Credit (`add`) or debit the spendable balance; returns the new balance.
    pub fn modify_balance(&mut self, store: &dyn KvStore, address: &Address, add: bool, amount: u64) -> LedgerResult<u64> {
        let next = apply_delta(self.balance(store, address)?, add, amount)?;
        self.pending.set_balance(*address, next);
        Ok(next)
    }

    pub fn stake_balance(&self, store: &dyn KvStore, address: &Address) -> LedgerResult<u64> {
        match self.pending.stake_balances.get(address) {
            Some(b) => Ok(*b),
            None => read_u64(store, &stake_balance_key(address)),
        }
    }

    pub fn modify_stake_balance(&mut self, store: &dyn KvStore, address: &Address, add: bool, amount: u64) -> LedgerResult<u64> {
        let next = apply_delta(self.stake_balance(store, address)?, add, amount)?;
        self.pending.set_stake_balance(*address, next);
        Ok(next)
    }

    /// Store `value` under its keccak256 hash and return the hash.
    pub fn put_value(&mut self, value: Vec<u8>) -> [u8; 32] {
        let hash = keccak256(&value);
        self.pending.set_value(hash, value);
        hash
    }

    pub fn value(&self, store: &dyn KvStore, hash: &[u8; 32]) -> LedgerResult<Option<Vec<u8>>> {
        if let Some(v) = self.pending.values.get(hash) {
            return Ok(Some(v.clone()));
        }
        match store.get(&value_key(hash))? {
            Some(bytes) => Ok(Some(codec::decode::<Vec<u8>>(&bytes)?.0)),
            None => Ok(None),
        }
    }
}

impl SubLedger for Accounts {
    fn begin(&mut self) { self.pending.undo = Some(Vec::new()) }
    fn rollback(&mut self) { self.pending.rollback() }
    fn release(&mut self) { self.pending.undo = None }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        for (addr, b) in &self.pending.balances {
            batch.put(balance_key(addr), codec::encode(b)?);
        }
        for (addr, b) in &self.pending.stake_balances {
            batch.put(stake_balance_key(addr), codec::encode(b)?);
        }
        for (hash, v) in &self.pending.values {
            batch.put(value_key(hash), codec::encode(v)?);
        }
        Ok(())
    }

    // The store is the only current view.
    fn commit(&mut self) {
        self.pending = AccountPending::default();
    }

    fn abort(&mut self) {
        self.pending = AccountPending::default();
    }
}

#[cfg(test)]
mod account_tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn debit_beyond_balance_fails() {
        let store = MemoryStore::new();
        let mut acc = Accounts::new();
        let a = Address::from_bytes([1; 20]);
        acc.set_balance(a, 10);
        assert!(matches!(acc.modify_balance(&store, &a, false, 11), Err(LedgerError::InsufficientFunds)));
        assert_eq!(acc.modify_balance(&store, &a, false, 4).expect("debit"), 6);
    }

    #[test]
    fn committed_balances_are_read_from_store() {
        let store = MemoryStore::new();
        let mut acc = Accounts::new();
        let a = Address::from_bytes([1; 20]);
        acc.modify_balance(&store, &a, true, 50).expect("credit");
        acc.modify_stake_balance(&store, &a, true, 7).expect("stake");
        let mut batch = WriteBatch::new();
        acc.stage_writes(&mut batch).expect("stage");
        store.write(batch).expect("write");
        acc.commit();

        assert_eq!(acc.balance(&store, &a).expect("bal"), 50);
        assert_eq!(acc.stake_balance(&store, &a).expect("stake"), 7);
    }

    #[test]
    fn values_are_content_addressed() {
        let store = MemoryStore::new();
        let mut acc = Accounts::new();
        let h = acc.put_value(b"hello".to_vec());
        assert_eq!(h, keccak256(b"hello"));
        assert_eq!(acc.value(&store, &h).expect("value"), Some(b"hello".to_vec()));
        acc.abort();
        assert_eq!(acc.value(&store, &h).expect("value"), None);
    }

    #[test]
    fn rollback_restores_entries_touched_in_tx() {
        let store = MemoryStore::new();
        let mut acc = Accounts::new();
        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);
        acc.set_balance(a, 10);
        acc.begin();
        acc.modify_balance(&store, &a, false, 3).expect("debit");
        acc.modify_balance(&store, &a, false, 3).expect("debit");
        acc.modify_balance(&store, &b, true, 5).expect("credit");
        acc.modify_stake_balance(&store, &b, true, 5).expect("stake");
        let h = acc.put_value(b"v".to_vec());
        acc.rollback();

        assert_eq!(acc.balance(&store, &a).expect("bal"), 10);
        assert_eq!(acc.balance(&store, &b).expect("bal"), 0);
        assert_eq!(acc.stake_balance(&store, &b).expect("stake"), 0);
        assert_eq!(acc.value(&store, &h).expect("value"), None);
        let mut batch = WriteBatch::new();
        acc.stage_writes(&mut batch).expect("stage");
        assert_eq!(batch.len(), 1);
    }
}
