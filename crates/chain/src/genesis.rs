//! Genesis parameters.
//!
//! Loaded once when a node boots. The economic knobs here seed
//! [`SystemParameters`](crate::state::SystemParameters); later changes only
//! happen through governance. Files may be TOML or JSON (picked by extension).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::crypto::keccak256_hex;
use crate::error::{LedgerError, LedgerResult};
use crate::types::{Address, SECONDS_7_DAY, SECONDS_DAY};

pub const DEFAULT_VALUE_UNIT_SIZE: u64 = 1024;
pub const DEFAULT_LOOKBACK_WINDOW: i64 = 60;
pub const DEFAULT_ROOT_ADDRESS: &str = "0x8db97c7cece249c2b98bdc0226cc4c2a57bf52fc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airdrop {
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAllocation {
    pub address: Address,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Genesis {
    pub magic: u64,
    pub symbol: String,

    // tx params
    pub base_tx_units: u64,
    pub value_unit_size: u64,
    pub max_value_size: u64,

    // fee mechanism
    pub min_price: u64,
    pub lookback_window: i64,
    pub target_block_rate: i64,

    // allocations
    pub custom_allocation: Vec<CustomAllocation>,
    pub airdrop_hash: String,
    pub airdrop_units: u64,

    // chain economics
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
}

impl Default for Genesis {
    fn default() -> Self {
        let root = Address::from_hex(DEFAULT_ROOT_ADDRESS).unwrap_or(Address::ZERO);
        Genesis {
            magic: 0,
            symbol: "SAMA".to_string(),

            base_tx_units: 1,
            value_unit_size: DEFAULT_VALUE_UNIT_SIZE,
            max_value_size: 200 * 1024,

            min_price: 0,
            lookback_window: DEFAULT_LOOKBACK_WINDOW,
            target_block_rate: 1,

            custom_allocation: Vec::new(),
            airdrop_hash: String::new(),
            airdrop_units: 0,

            total_tokens: 2_100_000_000_000,
            claim_min_units: 100,
            claim_min_interval: SECONDS_7_DAY,
            total_years: 10,
            rate_sustain_years: 1,
            chain_create_time: 1_668_125_288,
            min_stake_time: 90 * SECONDS_DAY,

            miner_perc: 20,
            foundation_perc: 40,
            route_perc: 30,
            ser_perc: 50,
            validator_perc: 20,
            base_ser_perc: 20,
            merit_ser_perc: 80,
            base_route_perc: 20,
            merit_route_perc: 80,
            burn_perc: 20,

            route_stake: 200_000_000,
            ser_stake: 100_000_000,

            month_card: 100,
            season_card: 300,
            annual_card: 1200,

            root_address: root,
            foundation_address: root,
        }
    }
}

impl Genesis {
    pub fn verify(&self) -> LedgerResult<()> {
        if self.magic == 0 {
            return Err(LedgerError::InvalidMagic);
        }
        if self.target_block_rate == 0 {
            return Err(LedgerError::InvalidBlockRate);
        }
        Ok(())
    }

    /// Balances to seed: the airdrop (checked against `airdrop_hash`) first,
    /// custom allocations last so they win for addresses in both lists.
    pub fn allocations(&self, airdrop_data: Option<&[u8]>) -> LedgerResult<Vec<(Address, u64)>> {
        let mut out = Vec::new();
        if !self.airdrop_hash.is_empty() {
            let data = airdrop_data
                .ok_or_else(|| LedgerError::Genesis("airdrop data missing".to_string()))?;
            let h = keccak256_hex(data);
            if !h.eq_ignore_ascii_case(&self.airdrop_hash) {
                return Err(LedgerError::Genesis(format!(
                    "expected standard allocation {} but got {}",
                    self.airdrop_hash, h
                )));
            }
            let airdrop: Vec<Airdrop> = serde_json::from_slice(data)
                .map_err(|e| LedgerError::Genesis(format!("airdrop decode: {}", e)))?;
            debug!(hash = %h, addrs = airdrop.len(), balance = self.airdrop_units, "applied airdrop allocation");
            out.extend(airdrop.into_iter().map(|a| (a.address, self.airdrop_units)));
        }
        for alloc in &self.custom_allocation {
            out.push((alloc.address, alloc.balance));
        }
        Ok(out)
    }
}

/// Load genesis from a `.json` or TOML file.
pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Genesis> {
    let p = path.as_ref();
    let s = fs::read_to_string(p).with_context(|| format!("read genesis {}", p.display()))?;
    let is_json = p.extension().map(|e| e == "json").unwrap_or(false);
    let g: Genesis = if is_json {
        serde_json::from_str(&s).context("parse genesis json")?
    } else {
        toml::from_str(&s).context("parse genesis toml")?
    };
    Ok(g)
}
