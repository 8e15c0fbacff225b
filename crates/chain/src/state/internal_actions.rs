//! # Action Registry
//!
//! Open governance actions. An action is opened by Proposal (or implicitly by
//! Register), collects votes until `end_time`, and is consumed by Govern or
//! by a confirmed Stake.
//!
//! ## Lifecycle
//!
//! ```text
//!   Proposal / Register ──► open (voters = [sender] if it may vote)
//!   Vote                ──► voters += sender        (until end_time)
//!   Withdrawn           ──► voters -= sender
//!   Govern              ──► applied                 (until end_time + 7d)
//!   Stake               ──► deleted
//!   reload(now)         ──► rows with end_time < now are skipped
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::codec::CodecError;
use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{ActionId, Address, TxId};

use super::internal_staged::{scan_records, StagedMap, SubLedger};
use super::internal_state_layout::{action_key, action_prefix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionType {
    AddStaker = 1,
    ModifySysParam = 2,
    AddUserType = 3,
    ModifyUserType = 4,
    ModifyFoundation = 5,
}

impl ActionType {
    pub fn from_u64(v: u64) -> Option<Self> {
        match v {
            1 => Some(ActionType::AddStaker),
            2 => Some(ActionType::ModifySysParam),
            3 => Some(ActionType::AddUserType),
            4 => Some(ActionType::ModifyUserType),
            5 => Some(ActionType::ModifyFoundation),
            _ => None,
        }
    }

    pub fn as_u64(self) -> u64 { self as u64 }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::AddStaker => "addStaker",
            ActionType::ModifySysParam => "modifySysParam",
            ActionType::AddUserType => "addUserType",
            ActionType::ModifyUserType => "modifyUserType",
            ActionType::ModifyFoundation => "modifyFoundation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: ActionId,
    pub action_type: ActionType,
    pub start_time: u64,
    pub end_time: u64,
    pub tx_ids: Vec<TxId>,
    pub voters: Vec<Address>,
    pub key: String,
    pub new_value: String,
}

impl ActionRecord {
    pub fn has_voter(&self, address: &Address) -> bool {
        self.voters.contains(address)
    }

    /// Drop `address` from the voter list; absent voters are ignored.
    pub fn remove_voter(&mut self, address: &Address) {
        self.voters.retain(|v| v != address);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: StagedMap<ActionId, ActionRecord>,
}

impl ActionRegistry {
    pub fn new() -> Self { Self::default() }

    /// Load actions still open at `now`.
    pub fn reload(&mut self, store: &dyn KvStore, now: u64) -> LedgerResult<usize> {
        let records: Vec<ActionRecord> = scan_records(store, &action_prefix())?;
        let mut n = 0;
        let mut expired = 0;
        self.actions.clear_current();
        for a in records {
            if a.end_time < now {
                expired += 1;
                continue;
            }
            self.actions.insert_current(a.action_id, a);
            n += 1;
        }
        debug!(count = n, expired, "reload actions");
        Ok(n)
    }

    /// Raw lookup, ignoring expiry.
    pub fn get(&self, id: &ActionId) -> Option<&ActionRecord> {
        self.actions.get(id)
    }

    /// Lookup that treats an action past its end time as overdue.
    pub fn get_live(&self, id: &ActionId, now: u64) -> LedgerResult<Option<&ActionRecord>> {
        match self.actions.get(id) {
            Some(a) if a.end_time < now => Err(LedgerError::ActionOverdue),
            other => Ok(other),
        }
    }

    pub fn put_action(&mut self, action: ActionRecord) {
        self.actions.put(action.action_id, action);
    }

    pub fn del_action(&mut self, id: &ActionId) {
        self.actions.delete(id);
    }

    pub fn actions(&self) -> Vec<&ActionRecord> {
        self.actions.values()
    }

    /// Voter count and id of the open action of `action_type` for `key`.
    /// Actions past their end time at `now` are ignored.
    pub fn voters_num(&self, action_type: ActionType, key: &str, now: u64) -> Option<(usize, ActionId)> {
        self.actions
            .values()
            .into_iter()
            .find(|a| a.action_type == action_type && a.key == key && a.end_time >= now)
            .map(|a| (a.voters.len(), a.action_id))
    }

    /// Every action of `action_type` for `key`, overdue ones included.
    pub fn by_key(&self, action_type: ActionType, key: &str) -> Vec<&ActionRecord> {
        self.actions
            .values()
            .into_iter()
            .filter(|a| a.action_type == action_type && a.key == key)
            .collect()
    }

    /// Reject a proposal whose id or key is already open, committed first,
    /// then pending.
    pub fn proposal_repeat(&self, id: &ActionId, key: &str) -> LedgerResult<()> {
        let current = self.actions.current();
        let pending = self.actions.pending();
        if current.contains_key(id) && !pending.del.contains(id) {
            return Err(LedgerError::ProposalRepeat("action exist curActions"));
        }
        if current.values().any(|a| a.key == key && !pending.del.contains(&a.action_id)) {
            return Err(LedgerError::ProposalRepeat("key exist curActions"));
        }
        if pending.add.contains_key(id) {
            return Err(LedgerError::ProposalRepeat("action id exist pending"));
        }
        if pending.add.values().any(|a| a.key == key) {
            return Err(LedgerError::ProposalRepeat("key exist pending"));
        }
        Ok(())
    }

    pub fn check_action_type(action_type: u64) -> bool {
        ActionType::from_u64(action_type).is_some()
    }
}

impl SubLedger for ActionRegistry {
    fn begin(&mut self) { self.actions.begin() }
    fn rollback(&mut self) { self.actions.rollback() }
    fn release(&mut self) { self.actions.release() }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        self.actions.stage_writes(batch, action_key)
    }

    fn commit(&mut self) { self.actions.commit() }
    fn abort(&mut self) { self.actions.abort() }
}

#[cfg(test)]
mod action_tests {
    use super::*;
    use crate::db::MemoryStore;

    fn action(id: u8, key: &str, end: u64) -> ActionRecord {
        ActionRecord {
            action_id: ActionId::from_bytes([id; 20]),
            action_type: ActionType::ModifySysParam,
            start_time: 0,
            end_time: end,
            tx_ids: vec![],
            voters: vec![],
            key: key.into(),
            new_value: "30".into(),
        }
    }

    #[test]
    fn action_type_range() {
        assert!(!ActionRegistry::check_action_type(0));
        assert!(ActionRegistry::check_action_type(1));
        assert!(ActionRegistry::check_action_type(5));
        assert!(!ActionRegistry::check_action_type(6));
    }

    #[test]
    fn repeat_checks_current_then_pending() {
        let mut r = ActionRegistry::new();
        r.put_action(action(1, "burn", 100));
        assert_eq!(
            r.proposal_repeat(&ActionId::from_bytes([1; 20]), "x").unwrap_err().to_string(),
            "action id exist pending"
        );
        assert_eq!(
            r.proposal_repeat(&ActionId::from_bytes([2; 20]), "burn").unwrap_err().to_string(),
            "key exist pending"
        );
        r.commit();
        assert_eq!(
            r.proposal_repeat(&ActionId::from_bytes([1; 20]), "x").unwrap_err().to_string(),
            "action exist curActions"
        );
        assert_eq!(
            r.proposal_repeat(&ActionId::from_bytes([2; 20]), "burn").unwrap_err().to_string(),
            "key exist curActions"
        );
        assert!(r.proposal_repeat(&ActionId::from_bytes([2; 20]), "serPerc").is_ok());
    }

    #[test]
    fn overdue_actions() {
        let mut r = ActionRegistry::new();
        r.put_action(action(1, "burn", 100));
        let id = ActionId::from_bytes([1; 20]);
        assert!(r.get_live(&id, 100).expect("live").is_some());
        assert!(matches!(r.get_live(&id, 101), Err(LedgerError::ActionOverdue)));
        assert!(r.get(&id).is_some());
    }

    #[test]
    fn voters_num_skips_overdue_action_for_same_key() {
        let mut r = ActionRegistry::new();
        let mut old = action(1, "0xabc", 100);
        old.action_type = ActionType::AddStaker;
        let mut new = action(2, "0xabc", 900);
        new.action_type = ActionType::AddStaker;
        new.voters.push(Address::from_bytes([9; 20]));
        r.put_action(old);
        r.put_action(new);

        assert_eq!(r.voters_num(ActionType::AddStaker, "0xabc", 50).map(|v| v.1), Some(ActionId::from_bytes([1; 20])));
        assert_eq!(r.voters_num(ActionType::AddStaker, "0xabc", 500), Some((1, ActionId::from_bytes([2; 20]))));
        assert!(r.voters_num(ActionType::AddStaker, "0xabc", 901).is_none());
        assert_eq!(r.by_key(ActionType::AddStaker, "0xabc").len(), 2);
    }

    #[test]
    fn reload_skips_expired() {
        let store = MemoryStore::new();
        let mut r = ActionRegistry::new();
        r.put_action(action(1, "burn", 100));
        r.put_action(action(2, "serPerc", 500));
        let mut batch = WriteBatch::new();
        r.stage_writes(&mut batch).expect("stage");
        store.write(batch).expect("write");

        let mut fresh = ActionRegistry::new();
        assert_eq!(fresh.reload(&store, 200).expect("reload"), 1);
        assert_eq!(fresh.voters_num(ActionType::ModifySysParam, "serPerc", 200).map(|v| v.0), Some(0));
        assert!(fresh.voters_num(ActionType::ModifySysParam, "burn", 200).is_none());
    }

    #[test]
    fn withdraw_absent_voter_is_noop() {
        let mut a = action(1, "burn", 100);
        a.voters.push(Address::from_bytes([9; 20]));
        a.remove_voter(&Address::from_bytes([8; 20]));
        assert_eq!(a.voters.len(), 1);
        a.remove_voter(&Address::from_bytes([9; 20]));
        assert!(a.voters.is_empty());
    }
}
