//! # Reward Ledger & Emission Schedule
//!
//! Per-address accrued rewards plus a global "last reward operation"
//! checkpoint that only moves forward.
//!
//! ## Emission
//!
//! ```text
//!   p       = year / rate_sustain_years
//!   S       = Σ_{q < total_years / rate_sustain_years} 0.8^q
//!   year(i) = T · 0.8^p / (rate_sustain_years · S)      (0 once i >= total_years)
//!   T       = total_tokens / 100 · miner_perc
//! ```
//!
//! ## Staker reward over [start, end]
//!
//! For every year slice overlapping the interval:
//!
//! ```text
//!   role_total = year(i) · role% / 100
//!   base  += role_total · base% / 100 / (role_num · YEAR) · secs
//!   merit += role_total · merit% / 100 / YEAR · secs · pow(user) / pow(role)
//! ```
//!
//! Validators take the whole role share as base. Yield is added once per
//! call: `undistributed · role% / 100 / role_num`. Amounts are cumulative
//! with whatever the address already has on record.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{self, CodecError};
use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{Address, StakerRole, TxId, SECONDS_YEAR};

use super::internal_staged::{scan_records, StagedMap, StagedValue, SubLedger};
use super::internal_state_layout::{reward_global_key, reward_key, reward_prefix};
use super::internal_sys_params::SystemParameters;
use super::Ledger;

const DECAY_RATE: f64 = 0.8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGlobal {
    pub last_opr_time: u64,
    pub last_opr_tx: TxId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub yield_reward: u64,
    pub base_reward: u64,
    pub merit_reward: u64,
    pub last_opr_time: u64,
    pub last_opr_tx: TxId,
    pub last_claim_time: u64,
    pub last_claim_tx: TxId,
    pub address: Address,
}

impl RewardRecord {
    /// Zero accrual with fresh operation and claim stamps.
    pub fn settled(address: Address, tx_id: TxId, time: u64) -> Self {
        RewardRecord {
            last_opr_time: time,
            last_opr_tx: tx_id,
            last_claim_time: time,
            last_claim_tx: tx_id,
            address,
            ..Default::default()
        }
    }

    pub fn total(&self) -> u64 {
        self.base_reward
            .saturating_add(self.merit_reward)
            .saturating_add(self.yield_reward)
    }
}

/// Who is claiming: the foundation address or a staker of some role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claimer {
    Foundation,
    Staker(StakerRole),
}

#[derive(Debug, Clone, Default)]
pub struct RewardLedger {
    records: StagedMap<Address, RewardRecord>,
    global: StagedValue<RewardGlobal>,
}

impl RewardLedger {
    pub fn new() -> Self { Self::default() }

    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<usize> {
        let records: Vec<RewardRecord> = scan_records(store, &reward_prefix())?;
        let n = records.len();
        self.records.clear_current();
        for r in records {
            self.records.insert_current(r.address, r);
        }
        let global = match store.get(&reward_global_key())? {
            Some(bytes) => codec::decode::<RewardGlobal>(&bytes)?.0,
            None => RewardGlobal::default(),
        };
        self.global.set_current(global);
        debug!(count = n, "reload rewards");
        Ok(n)
    }

    pub fn get(&self, address: &Address) -> Option<&RewardRecord> {
        self.records.get(address)
    }

    pub fn last_update_time(&self) -> u64 {
        self.global.get().last_opr_time
    }

    pub fn global(&self) -> &RewardGlobal {
        self.global.get()
    }

    pub fn last_claim_time(&self, address: &Address) -> u64 {
        self.records.get(address).map(|r| r.last_claim_time).unwrap_or(0)
    }

    pub fn update_owner(&mut self, record: RewardRecord) {
        self.records.put(record.address, record);
    }

    pub fn update_global(&mut self, global: RewardGlobal) {
        self.global.set(global);
    }

    pub fn update_reward(&mut self, global: RewardGlobal, record: RewardRecord) {
        self.update_owner(record);
        self.update_global(global);
    }

    pub fn rewards(&self) -> Vec<&RewardRecord> {
        self.records.values()
    }

    pub fn del_reward(&mut self, address: &Address) {
        self.records.delete(address);
    }
}

impl SubLedger for RewardLedger {
    fn begin(&mut self) {
        self.records.begin();
        self.global.begin();
    }

    fn rollback(&mut self) {
        self.records.rollback();
        self.global.rollback();
    }

    fn release(&mut self) {
        self.records.release();
        self.global.release();
    }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        self.records.stage_writes(batch, reward_key)?;
        self.global.stage_write(batch, reward_global_key())
    }

    fn commit(&mut self) {
        self.records.commit();
        self.global.commit();
    }

    fn abort(&mut self) {
        self.records.abort();
        self.global.abort();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// EMISSION SCHEDULE
// ════════════════════════════════════════════════════════════════════════════

/// Emission of year `index` counted from chain creation.
pub fn reward_cur_year(params: &SystemParameters, index: u64) -> u64 {
    if index >= params.total_years as u64 {
        return 0;
    }
    let sustain = params.rate_sustain_years.max(1) as u64;
    let periods = (params.total_years as u64 / sustain).max(1);
    let norm: f64 = (0..periods).map(|q| DECAY_RATE.powi(q as i32)).sum();
    let quota = DECAY_RATE.powi((index / sustain) as i32);
    let year = params.chain_token_amount() as f64 * quota / (sustain as f64 * norm);
    year as u64
}

fn mul_div(a: u64, b: u64, c: u64) -> u64 {
    if c == 0 {
        return 0;
    }
    let v = (a as u128) * (b as u128) / (c as u128);
    v.min(u64::MAX as u128) as u64
}

/// Walk the year slices of [start, end] relative to `create`.
/// Yields (year index, seconds of overlap).
fn year_slices(create: u64, start: u64, end: u64) -> Vec<(u64, u64)> {
    let start = start.max(create);
    if end <= start {
        return Vec::new();
    }
    let s_year = (start - create) / SECONDS_YEAR;
    let e_year = (end - create) / SECONDS_YEAR;
    (s_year..=e_year)
        .filter_map(|i| {
            let lo = (create + i * SECONDS_YEAR).max(start);
            let hi = (create + (i + 1) * SECONDS_YEAR).min(end);
            (hi > lo).then_some((i, hi - lo))
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER ALGORITHMS
// ════════════════════════════════════════════════════════════════════════════

impl Ledger {
    pub fn reward_cur_year(&self, index: u64) -> u64 {
        reward_cur_year(self.sys_params.params(), index)
    }

    /// Cumulative (base, merit, yield) for `address` as of `end_time`.
    /// Pure: nothing is written.
    pub fn staker_reward(
        &self,
        role: StakerRole,
        role_num: usize,
        address: &Address,
        stake_time: u64,
        end_time: u64,
    ) -> LedgerResult<(u64, u64, u64)> {
        let params = self.sys_params.params();
        let role_num = role_num.max(1) as u64;
        let role_perc = params.role_perc(role) as u64;
        let (perc_base, perc_merit) = params.role_split(role);

        let mut base = 0u64;
        let mut merit = 0u64;
        let mut yield_reward = 0u64;
        let mut start = stake_time;

        if let Some(prev) = self.rewards.get(address) {
            start = prev.last_opr_time.max(stake_time);
            base = prev.base_reward;
            merit = prev.merit_reward;
            yield_reward = prev.yield_reward;
        }

        let role_yields = mul_div(self.yields.chain_yields(), role_perc, 100);
        yield_reward = yield_reward.saturating_add(role_yields / role_num);

        // proofs are metered under the node's work address
        let (user_pow, total_pow) = match role {
            StakerRole::Validator => (0, 0),
            _ => {
                let miner = self.details.by_stake_address(address).map(|d| d.work_address).unwrap_or(*address);
                (self.pows.pow_time(role, &miner), self.pows.total_pow_time(role))
            }
        };

        for (year, secs) in year_slices(params.chain_create_time, start, end_time) {
            let role_total = mul_div(reward_cur_year(params, year), role_perc, 100);
            match role {
                StakerRole::Validator => {
                    let rate = role_total / (role_num * SECONDS_YEAR);
                    base = base.saturating_add(rate.saturating_mul(secs));
                }
                _ => {
                    let base_total = mul_div(role_total, perc_base as u64, 100);
                    let merit_total = mul_div(role_total, perc_merit as u64, 100);
                    let base_rate = base_total / (role_num * SECONDS_YEAR);
                    base = base.saturating_add(base_rate.saturating_mul(secs));

                    let merit_slice = (merit_total / SECONDS_YEAR).saturating_mul(secs);
                    merit = merit.saturating_add(mul_div(merit_slice, user_pow, total_pow));
                }
            }
        }
        Ok((base, merit, yield_reward))
    }

    /// Foundation share accrued since its last claim.
    pub fn foundation_reward(&self, address: &Address, end_time: u64) -> LedgerResult<u64> {
        let params = self.sys_params.params();
        let create = params.chain_create_time;
        let start = self
            .rewards
            .get(address)
            .map(|r| r.last_claim_time.max(create))
            .unwrap_or(create);
        if end_time < start {
            return Err(LedgerError::ClaimEndTime);
        }
        let perc = params.foundation_perc as u64;
        let mut total = 0u64;
        for (year, secs) in year_slices(create, start, end_time) {
            let share = mul_div(reward_cur_year(params, year), perc, 100);
            total = total.saturating_add((share / SECONDS_YEAR).saturating_mul(secs));
        }
        Ok(total)
    }

    /// Recompute and persist every staker of `role` up to `end_time`.
    ///
    /// `claimer` already received its amount from the caller, so its record is
    /// written as settled (zero accrual) instead of recomputed.
    pub fn update_staker_reward(&mut self, role: StakerRole, claimer: &Address, tx_id: TxId, end_time: u64) -> LedgerResult<()> {
        let last = self.rewards.last_update_time();
        if last > end_time {
            return Err(LedgerError::EndTimeTooEarly);
        }
        if last == end_time {
            if self.stakers.get(role, claimer).is_some() {
                self.rewards.update_owner(RewardRecord::settled(*claimer, tx_id, end_time));
            }
            return Ok(());
        }

        let role_num = self.stakers.count(role);
        if role_num == 0 {
            return Ok(());
        }

        let stakers: Vec<(Address, u64)> = self
            .stakers
            .stakers(role)
            .into_iter()
            .map(|s| (s.address, s.stake_time))
            .collect();

        let mut updates = Vec::with_capacity(stakers.len());
        for (addr, stake_time) in stakers {
            if stake_time >= end_time {
                continue;
            }
            let mut record = RewardRecord::settled(addr, tx_id, end_time);
            if addr != *claimer {
                let (base, merit, yield_reward) = self.staker_reward(role, role_num, &addr, stake_time, end_time)?;
                record.base_reward = base;
                record.merit_reward = merit;
                record.yield_reward = yield_reward;
            }
            updates.push(record);
        }

        debug!(role = %role, count = updates.len(), end_time, "staker rewards updated");
        for record in updates {
            self.rewards.update_owner(record);
        }
        self.rewards.update_global(RewardGlobal { last_opr_time: end_time, last_opr_tx: tx_id });
        self.yields.modify_yields(0, tx_id, end_time)?;
        Ok(())
    }

    /// Mark the foundation as paid up to `end_time`.
    pub fn update_foundation_reward(&mut self, address: &Address, tx_id: TxId, end_time: u64) -> LedgerResult<()> {
        if self.rewards.last_update_time() > end_time {
            return Err(LedgerError::EndTimeTooEarly);
        }
        self.rewards.update_owner(RewardRecord::settled(*address, tx_id, end_time));
        Ok(())
    }

    /// (base, merit, yield) the claimer would receive at `end_time`.
    pub fn calc_reward(&self, claimer: Claimer, address: &Address, end_time: u64) -> LedgerResult<(u64, u64, u64)> {
        match claimer {
            Claimer::Foundation => {
                if *address != self.sys_params.params().foundation_address {
                    return Err(LedgerError::ClaimerType);
                }
                Ok((self.foundation_reward(address, end_time)?, 0, 0))
            }
            Claimer::Staker(role) => {
                let staker = self.stakers.get(role, address).ok_or(LedgerError::StakerNotFound)?;
                if end_time < staker.stake_time {
                    return Err(LedgerError::RewardBeforeStake { end: end_time, stake: staker.stake_time });
                }
                let role_num = self.stakers.count(role);
                self.staker_reward(role, role_num, address, staker.stake_time, end_time)
            }
        }
    }

    /// Stakers claim under their role; otherwise the foundation address.
    pub fn check_claim_address(&self, address: &Address) -> Option<Claimer> {
        if let Some(role) = self.stakers.is_staker(address) {
            return Some(Claimer::Staker(role));
        }
        if *address == self.sys_params.params().foundation_address {
            return Some(Claimer::Foundation);
        }
        None
    }
}
