//! # Staker Registry
//!
//! One staged map per role. A (role, address) pair holds at most one record;
//! the record is created by a confirmed Stake and removed by UnStake.
//!
//! ```text
//!   Register ──► action(AddStaker, key = staker addr)
//!   Vote(s)  ──► quorum
//!   Stake    ──► DealStakeTx: settle role rewards up to now, put staker
//!   UnStake  ──► DealUnStakeTx: settle role rewards up to end, drop staker
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::CodecError;
use crate::db::{KvStore, WriteBatch};
use crate::error::LedgerResult;
use crate::types::{Address, StakerRole, TxId};

use super::internal_staged::{scan_records, StagedMap, SubLedger};
use super::internal_state_layout::{staker_key, staker_prefix};
use super::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerRecord {
    pub tx_id: TxId,
    pub role: StakerRole,
    pub amount: u64,
    pub stake_time: u64,
    pub address: Address,
}

#[derive(Debug, Clone, Default)]
pub struct StakerRegistry {
    route: StagedMap<Address, StakerRecord>,
    ser: StagedMap<Address, StakerRecord>,
    validator: StagedMap<Address, StakerRecord>,
}

impl StakerRegistry {
    pub fn new() -> Self { Self::default() }

    fn map(&self, role: StakerRole) -> &StagedMap<Address, StakerRecord> {
        match role {
            StakerRole::Route => &self.route,
            StakerRole::Service => &self.ser,
            StakerRole::Validator => &self.validator,
        }
    }

    fn map_mut(&mut self, role: StakerRole) -> &mut StagedMap<Address, StakerRecord> {
        match role {
            StakerRole::Route => &mut self.route,
            StakerRole::Service => &mut self.ser,
            StakerRole::Validator => &mut self.validator,
        }
    }

    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<usize> {
        let mut n = 0;
        for role in StakerRole::ALL {
            let records: Vec<StakerRecord> = scan_records(store, &staker_prefix(role))?;
            self.map_mut(role).clear_current();
            debug!(role = %role, count = records.len(), "reload stakers");
            for r in records {
                self.map_mut(role).insert_current(r.address, r);
                n += 1;
            }
        }
        Ok(n)
    }

    pub fn get(&self, role: StakerRole, address: &Address) -> Option<&StakerRecord> {
        self.map(role).get(address)
    }

    pub fn put(&mut self, record: StakerRecord) {
        self.map_mut(record.role).put(record.address, record);
    }

    pub fn delete(&mut self, role: StakerRole, address: &Address) {
        self.map_mut(role).delete(address);
    }

    /// Stakers of a role, ordered by address.
    pub fn stakers(&self, role: StakerRole) -> Vec<&StakerRecord> {
        self.map(role).values()
    }

    pub fn count(&self, role: StakerRole) -> usize {
        self.map(role).len()
    }

    /// (routes, sers, validators)
    pub fn stakers_num(&self) -> (usize, usize, usize) {
        (self.route.len(), self.ser.len(), self.validator.len())
    }

    pub fn is_route(&self, address: &Address) -> bool {
        self.route.contains(address)
    }

    pub fn is_ser(&self, address: &Address) -> bool {
        self.ser.contains(address)
    }

    pub fn is_validator(&self, address: &Address) -> bool {
        self.validator.contains(address)
    }

    /// First role (route, ser, validator order) the address is staked under.
    pub fn is_staker(&self, address: &Address) -> Option<StakerRole> {
        StakerRole::ALL.into_iter().find(|r| self.map(*r).contains(address))
    }
}

impl SubLedger for StakerRegistry {
    fn begin(&mut self) {
        self.route.begin();
        self.ser.begin();
        self.validator.begin();
    }

    fn rollback(&mut self) {
        self.route.rollback();
        self.ser.rollback();
        self.validator.rollback();
    }

    fn release(&mut self) {
        self.route.release();
        self.ser.release();
        self.validator.release();
    }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        for role in StakerRole::ALL {
            self.map(role).stage_writes(batch, |addr| staker_key(role, addr))?;
        }
        Ok(())
    }

    fn commit(&mut self) {
        for role in StakerRole::ALL {
            self.map_mut(role).commit();
        }
    }

    fn abort(&mut self) {
        for role in StakerRole::ALL {
            self.map_mut(role).abort();
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER WORKFLOWS
// ════════════════════════════════════════════════════════════════════════════

impl Ledger {
    /// Settle every existing staker of the role up to the new stake time, then
    /// add the staker. Newcomers never share in rewards accrued before them.
    pub fn deal_stake_tx(&mut self, staker: StakerRecord) -> LedgerResult<()> {
        self.update_staker_reward(staker.role, &staker.address, staker.tx_id, staker.stake_time)?;
        debug!(role = %staker.role, address = %staker.address, amount = staker.amount, "staker added");
        self.stakers.put(staker);
        Ok(())
    }

    /// Settle the role up to `end_time` (the leaver's own record is zeroed by
    /// the batch) and remove the staker.
    pub fn deal_unstake_tx(&mut self, role: StakerRole, address: &Address, tx_id: TxId, end_time: u64) -> LedgerResult<()> {
        self.update_staker_reward(role, address, tx_id, end_time)?;
        self.stakers.delete(role, address);
        debug!(role = %role, address = %address, "staker removed");
        Ok(())
    }
}
