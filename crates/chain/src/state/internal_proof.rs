//! Proof meters: cumulative work-time and flow per (role, miner).
//! Only route and ser nodes submit proofs. Records only grow and are never
//! removed by transactions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::CodecError;
use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{Address, StakerRole, TxId};

use super::internal_staged::{scan_records, StagedMap, SubLedger};
use super::internal_state_layout::{pow_key, pow_prefix};

pub const MIN_NETFLOW: u64 = 1;
pub const MAX_NETFLOW: u64 = 1000;
pub const MIN_PROOF_INTERVAL: u64 = 1;
pub const MAX_PROOF_INTERVAL: u64 = 60;

const POW_ROLES: [StakerRole; 2] = [StakerRole::Route, StakerRole::Service];

/// One accepted proof, as folded into the meter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofEntry {
    pub netflow: u64,
    pub work_time: u64,
    pub miner: Address,
    pub tx_id: TxId,
    pub update_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowRecord {
    pub role: StakerRole,
    pub total_time: u64,
    pub total_flow: u64,
    pub last_update_time: u64,
    pub last_update_tx: TxId,
    pub miner: Address,
}

#[derive(Debug, Clone, Default)]
pub struct ProofMeterRegistry {
    route: StagedMap<Address, PowRecord>,
    ser: StagedMap<Address, PowRecord>,
}

impl ProofMeterRegistry {
    pub fn new() -> Self { Self::default() }

    fn map(&self, role: StakerRole) -> Option<&StagedMap<Address, PowRecord>> {
        match role {
            StakerRole::Route => Some(&self.route),
            StakerRole::Service => Some(&self.ser),
            StakerRole::Validator => None,
        }
    }

    fn map_mut(&mut self, role: StakerRole) -> Option<&mut StagedMap<Address, PowRecord>> {
        match role {
            StakerRole::Route => Some(&mut self.route),
            StakerRole::Service => Some(&mut self.ser),
            StakerRole::Validator => None,
        }
    }

    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<usize> {
        let mut n = 0;
        for role in POW_ROLES {
            let records: Vec<PowRecord> = scan_records(store, &pow_prefix(role))?;
            if let Some(map) = self.map_mut(role) {
                map.clear_current();
                for r in records {
                    map.insert_current(r.miner, r);
                    n += 1;
                }
            }
        }
        debug!(count = n, "reload pows");
        Ok(n)
    }

    pub fn get(&self, role: StakerRole, miner: &Address) -> Option<&PowRecord> {
        self.map(role).and_then(|m| m.get(miner))
    }

    /// Fold a proof into the miner's meter for `role`.
    pub fn put_pow(&mut self, role: StakerRole, proof: ProofEntry) -> LedgerResult<()> {
        let map = self.map_mut(role).ok_or(LedgerError::PowRole)?;
        let next = match map.get(&proof.miner) {
            Some(prev) => {
                if prev.role != role {
                    return Err(LedgerError::PowRole);
                }
                PowRecord {
                    role,
                    total_time: prev.total_time.checked_add(proof.work_time).ok_or(LedgerError::Overflow)?,
                    total_flow: prev.total_flow.checked_add(proof.netflow).ok_or(LedgerError::Overflow)?,
                    last_update_time: proof.update_time,
                    last_update_tx: proof.tx_id,
                    miner: proof.miner,
                }
            }
            None => PowRecord {
                role,
                total_time: proof.work_time,
                total_flow: proof.netflow,
                last_update_time: proof.update_time,
                last_update_tx: proof.tx_id,
                miner: proof.miner,
            },
        };
        map.put(proof.miner, next);
        Ok(())
    }

    pub fn pows(&self, role: StakerRole) -> Vec<&PowRecord> {
        self.map(role).map(|m| m.values()).unwrap_or_default()
    }

    pub fn del_pow(&mut self, role: StakerRole, miner: &Address) {
        if let Some(map) = self.map_mut(role) {
            map.delete(miner);
        }
    }

    /// Carry a miner's meter over to its new work address (work key rotated).
    pub fn move_pow(&mut self, role: StakerRole, from: &Address, to: Address) {
        if let Some(map) = self.map_mut(role) {
            if let Some(mut record) = map.get(from).cloned() {
                map.delete(from);
                record.miner = to;
                map.put(to, record);
            }
        }
    }

    /// Sum of work-time over all miners of the role.
    pub fn total_pow_time(&self, role: StakerRole) -> u64 {
        self.pows(role).iter().fold(0u64, |acc, p| acc.saturating_add(p.total_time))
    }

    /// Work-time of one miner, zero if it never proved.
    pub fn pow_time(&self, role: StakerRole, miner: &Address) -> u64 {
        self.get(role, miner).map(|p| p.total_time).unwrap_or(0)
    }
}

impl SubLedger for ProofMeterRegistry {
    fn begin(&mut self) {
        self.route.begin();
        self.ser.begin();
    }

    fn rollback(&mut self) {
        self.route.rollback();
        self.ser.rollback();
    }

    fn release(&mut self) {
        self.route.release();
        self.ser.release();
    }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        self.route.stage_writes(batch, |a| pow_key(StakerRole::Route, a))?;
        self.ser.stage_writes(batch, |a| pow_key(StakerRole::Service, a))
    }

    fn commit(&mut self) {
        self.route.commit();
        self.ser.commit();
    }

    fn abort(&mut self) {
        self.route.abort();
        self.ser.abort();
    }
}

#[cfg(test)]
mod proof_tests {
    use super::*;

    fn entry(miner: u8, secs: u64, flow: u64) -> ProofEntry {
        ProofEntry {
            netflow: flow,
            work_time: secs,
            miner: Address::from_bytes([miner; 20]),
            tx_id: TxId::default(),
            update_time: 1_000,
        }
    }

    #[test]
    fn proofs_accumulate_within_and_across_blocks() {
        let mut p = ProofMeterRegistry::new();
        let a = Address::from_bytes([1; 20]);
        p.put_pow(StakerRole::Service, entry(1, 30, 500)).expect("put");
        p.put_pow(StakerRole::Service, entry(1, 10, 5)).expect("put");
        assert_eq!(p.pow_time(StakerRole::Service, &a), 40);
        p.commit();
        p.put_pow(StakerRole::Service, entry(1, 20, 5)).expect("put");
        let rec = p.get(StakerRole::Service, &a).expect("rec");
        assert_eq!(rec.total_time, 60);
        assert_eq!(rec.total_flow, 510);
    }

    #[test]
    fn move_pow_rekeys_meter() {
        let mut p = ProofMeterRegistry::new();
        let old = Address::from_bytes([1; 20]);
        let new = Address::from_bytes([2; 20]);
        p.put_pow(StakerRole::Route, entry(1, 30, 7)).expect("put");
        p.commit();
        p.move_pow(StakerRole::Route, &old, new);
        assert_eq!(p.pow_time(StakerRole::Route, &old), 0);
        let rec = p.get(StakerRole::Route, &new).expect("moved");
        assert_eq!((rec.total_time, rec.miner), (30, new));
        assert_eq!(p.total_pow_time(StakerRole::Route), 30);
    }

    #[test]
    fn totals_per_role() {
        let mut p = ProofMeterRegistry::new();
        p.put_pow(StakerRole::Route, entry(1, 30, 1)).expect("put");
        p.put_pow(StakerRole::Route, entry(2, 15, 1)).expect("put");
        p.put_pow(StakerRole::Service, entry(3, 7, 1)).expect("put");
        assert_eq!(p.total_pow_time(StakerRole::Route), 45);
        assert_eq!(p.total_pow_time(StakerRole::Service), 7);
        assert_eq!(p.total_pow_time(StakerRole::Validator), 0);
    }

    #[test]
    fn validators_have_no_meter() {
        let mut p = ProofMeterRegistry::new();
        assert!(matches!(p.put_pow(StakerRole::Validator, entry(1, 1, 1)), Err(LedgerError::PowRole)));
    }
}
