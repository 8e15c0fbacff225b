//! # System Parameters
//!
//! Singleton record of chain-wide economics, seeded from genesis and mutated
//! only through `ModifyParams` under a confirmed governance action.
//!
//! ## Governable keys
//!
//! | Key | Field | Complement |
//! |-----|-------|------------|
//! | `routePerc` | route_perc | ser_perc |
//! | `serPerc` | ser_perc | route_perc |
//! | `routeBase` | base_route_perc | merit_route_perc |
//! | `routeMerit` | merit_route_perc | base_route_perc |
//! | `serBase` | base_ser_perc | merit_ser_perc |
//! | `serMerit` | merit_ser_perc | base_ser_perc |
//! | `burn` | burn_perc | - |
//! | `foundationPerc` | foundation_perc | - |
//!
//! New values must parse as an integer percentage in `[5, 95]`.

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::genesis::Genesis;
use crate::types::{Address, StakerRole, TxId};

use super::internal_staged::{StagedValue, SubLedger};
use super::internal_state_layout::sys_params_key;

pub const MIN_PERCENTAGE: u32 = 5;
pub const MAX_PERCENTAGE: u32 = 95;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemParameters {
    pub symbol: String,
    pub total_tokens: u64,
    pub claim_min_units: u64,
    pub claim_min_interval: u64,
    pub total_years: u32,
    pub rate_sustain_years: u32,
    pub chain_create_time: u64,
    pub min_stake_time: u64,

    pub miner_perc: u32,
    pub foundation_perc: u32,
    pub route_perc: u32,
    pub ser_perc: u32,
    pub validator_perc: u32,
    pub base_ser_perc: u32,
    pub merit_ser_perc: u32,
    pub base_route_perc: u32,
    pub merit_route_perc: u32,
    pub burn_perc: u32,

    pub route_stake: u64,
    pub ser_stake: u64,

    pub month_card: u64,
    pub season_card: u64,
    pub annual_card: u64,

    pub root_address: Address,
    pub foundation_address: Address,

    pub update_time: u64,
    pub update_tx_id: TxId,
}

impl SystemParameters {
    pub fn from_genesis(g: &Genesis) -> Self {
        SystemParameters {
            symbol: g.symbol.clone(),
            total_tokens: g.total_tokens,
            claim_min_units: g.claim_min_units,
            claim_min_interval: g.claim_min_interval,
            total_years: g.total_years,
            rate_sustain_years: g.rate_sustain_years,
            chain_create_time: g.chain_create_time,
            min_stake_time: g.min_stake_time,
            miner_perc: g.miner_perc,
            foundation_perc: g.foundation_perc,
            route_perc: g.route_perc,
            ser_perc: g.ser_perc,
            validator_perc: g.validator_perc,
            base_ser_perc: g.base_ser_perc,
            merit_ser_perc: g.merit_ser_perc,
            base_route_perc: g.base_route_perc,
            merit_route_perc: g.merit_route_perc,
            burn_perc: g.burn_perc,
            route_stake: g.route_stake,
            ser_stake: g.ser_stake,
            month_card: g.month_card,
            season_card: g.season_card,
            annual_card: g.annual_card,
            root_address: g.root_address,
            foundation_address: g.foundation_address,
            update_time: 0,
            update_tx_id: TxId::default(),
        }
    }

    /// Tokens emitted to miners over the whole schedule.
    pub fn chain_token_amount(&self) -> u64 {
        (self.total_tokens / 100) * self.miner_perc as u64
    }

    pub fn role_perc(&self, role: StakerRole) -> u32 {
        match role {
            StakerRole::Route => self.route_perc,
            StakerRole::Service => self.ser_perc,
            StakerRole::Validator => self.validator_perc,
        }
    }

    /// (base, merit) split of a role's share. Validators are all base.
    pub fn role_split(&self, role: StakerRole) -> (u32, u32) {
        match role {
            StakerRole::Route => (self.base_route_perc, self.merit_route_perc),
            StakerRole::Service => (self.base_ser_perc, self.merit_ser_perc),
            StakerRole::Validator => (100, 0),
        }
    }

    pub fn stake_amount_ok(&self, role: StakerRole, amount: u64) -> bool {
        match role {
            StakerRole::Route => amount == self.route_stake,
            StakerRole::Service => amount == self.ser_stake,
            StakerRole::Validator => amount == self.route_stake || amount == self.ser_stake,
        }
    }

    fn param(&self, key: &str) -> LedgerResult<u32> {
        let v = match key {
            "routePerc" => self.route_perc,
            "serPerc" => self.ser_perc,
            "routeBase" => self.base_route_perc,
            "routeMerit" => self.merit_route_perc,
            "serBase" => self.base_ser_perc,
            "serMerit" => self.merit_ser_perc,
            "burn" => self.burn_perc,
            "foundationPerc" => self.foundation_perc,
            _ => return Err(LedgerError::ParamKey(key.to_string())),
        };
        Ok(v)
    }

    fn apply_param(&mut self, key: &str, perc: u32) -> LedgerResult<()> {
        let rest = 100 - perc;
        match key {
            "routePerc" => { self.route_perc = perc; self.ser_perc = rest; }
            "serPerc" => { self.ser_perc = perc; self.route_perc = rest; }
            "routeBase" => { self.base_route_perc = perc; self.merit_route_perc = rest; }
            "routeMerit" => { self.merit_route_perc = perc; self.base_route_perc = rest; }
            "serBase" => { self.base_ser_perc = perc; self.merit_ser_perc = rest; }
            "serMerit" => { self.merit_ser_perc = perc; self.base_ser_perc = rest; }
            "burn" => self.burn_perc = perc,
            "foundationPerc" => self.foundation_perc = perc,
            _ => return Err(LedgerError::ParamKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse_value(new_value: &str) -> LedgerResult<u64> {
    new_value
        .trim()
        .parse::<u64>()
        .map_err(|_| LedgerError::ParamValue(new_value.to_string()))
}

// ════════════════════════════════════════════════════════════════════════════
// STAGED LEDGER
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SysParamsLedger {
    inner: StagedValue<SystemParameters>,
}

impl SysParamsLedger {
    pub fn new(genesis: &Genesis) -> Self {
        SysParamsLedger { inner: StagedValue::new(SystemParameters::from_genesis(genesis)) }
    }

    /// Replace the genesis seed with the persisted record, if any.
    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<bool> {
        match store.get(&sys_params_key())? {
            Some(bytes) => {
                let (params, _) = codec::decode::<SystemParameters>(&bytes)?;
                self.inner.set_current(params);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stage the genesis seed so the next commit persists it.
    pub fn stage_seed(&mut self) {
        let seed = self.inner.current().clone();
        self.inner.set(seed);
    }

    /// Effective parameters (pending over current).
    pub fn params(&self) -> &SystemParameters {
        self.inner.get()
    }

    pub fn modify_params(&mut self, key: &str, new_value: &str, tx_id: TxId, update_time: u64) -> LedgerResult<()> {
        let perc = parse_value(new_value)?;
        if perc > MAX_PERCENTAGE as u64 || perc < MIN_PERCENTAGE as u64 {
            return Err(LedgerError::Percentage);
        }
        let mut next = self.inner.get().clone();
        next.apply_param(key, perc as u32)?;
        next.update_time = update_time;
        next.update_tx_id = tx_id;
        self.inner.set(next);
        Ok(())
    }

    /// Reject proposals that would not change anything.
    pub fn comp_cur_param(&self, key: &str, new_value: &str) -> LedgerResult<()> {
        let perc = parse_value(new_value)?;
        let old = self.inner.get().param(key)?;
        if old as u64 == perc {
            return Err(LedgerError::ParamUnchanged);
        }
        Ok(())
    }
}

impl SubLedger for SysParamsLedger {
    fn begin(&mut self) { self.inner.begin() }
    fn rollback(&mut self) { self.inner.rollback() }
    fn release(&mut self) { self.inner.release() }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        self.inner.stage_write(batch, sys_params_key())
    }

    fn commit(&mut self) { self.inner.commit() }
    fn abort(&mut self) { self.inner.abort() }
}
