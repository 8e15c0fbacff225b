//! Fee tier catalogue (subscriber "user types").
//!
//! Tiers are created and repriced only through governance. Genesis seeds the
//! three card tiers (month, season, annual) when the store has none.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::CodecError;
use crate::db::{KvStore, WriteBatch};
use crate::error::LedgerResult;

use super::internal_staged::{scan_records, StagedMap, SubLedger};
use super::internal_state_layout::{user_type_key, user_type_prefix};
use super::internal_sys_params::SystemParameters;

pub const TIER_MONTH: u64 = 1;
pub const TIER_SEASON: u64 = 2;
pub const TIER_ANNUAL: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub name: String,
    pub id: u64,
    pub fee: u64,
}

impl FeeTier {
    /// Card tiers derived from the genesis prices.
    pub fn card_tiers(params: &SystemParameters) -> Vec<FeeTier> {
        vec![
            FeeTier { name: "month".into(), id: TIER_MONTH, fee: params.month_card },
            FeeTier { name: "season".into(), id: TIER_SEASON, fee: params.season_card },
            FeeTier { name: "annual".into(), id: TIER_ANNUAL, fee: params.annual_card },
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeeTierCatalog {
    tiers: StagedMap<u64, FeeTier>,
}

impl FeeTierCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<usize> {
        let records: Vec<FeeTier> = scan_records(store, &user_type_prefix())?;
        let n = records.len();
        self.tiers.clear_current();
        for t in records {
            self.tiers.insert_current(t.id, t);
        }
        debug!(count = n, "reload user types");
        Ok(n)
    }

    pub fn get(&self, id: u64) -> Option<&FeeTier> {
        self.tiers.get(&id)
    }

    /// Insert or reprice a tier.
    pub fn add_user_type(&mut self, tier: FeeTier) {
        self.tiers.put(tier.id, tier);
    }

    pub fn del_user_type(&mut self, id: u64) {
        self.tiers.delete(&id);
    }

    pub fn user_types(&self) -> Vec<&FeeTier> {
        self.tiers.values()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn check_user_type(&self, id: u64) -> bool {
        self.tiers.contains(&id)
    }

    pub fn check_fee(&self, id: u64, fee: u64) -> bool {
        self.get(id).map(|t| t.fee == fee).unwrap_or(false)
    }
}

impl SubLedger for FeeTierCatalog {
    fn begin(&mut self) { self.tiers.begin() }
    fn rollback(&mut self) { self.tiers.rollback() }
    fn release(&mut self) { self.tiers.release() }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        self.tiers.stage_writes(batch, |id| user_type_key(*id))
    }

    fn commit(&mut self) { self.tiers.commit() }
    fn abort(&mut self) { self.tiers.abort() }
}
