//! # Node Detail Registry
//!
//! Network descriptor of every registered node, keyed by its work address
//! (the address derived from the node's work key). The stake address links a
//! detail back to the [`StakerRegistry`](super::internal_staking::StakerRegistry).
//!
//! A work address is "valid" only while its detail points at a live route or
//! ser staker.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::CodecError;
use crate::db::{KvStore, WriteBatch};
use crate::error::LedgerResult;
use crate::types::{Address, StakerRole, TxId};

use super::internal_staged::{scan_records, StagedMap, SubLedger};
use super::internal_state_layout::{detail_key, detail_prefix};
use super::Ledger;

/// Network fields a node submits with Register and Refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeParams {
    pub country: String,
    #[serde(rename = "localIP")]
    pub local_ip: String,
    #[serde(rename = "publicIP")]
    pub public_ip: String,
    pub min_port: u64,
    pub max_port: u64,
    pub check_port: u64,
    pub work_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDetail {
    pub role: StakerRole,
    pub params: NodeParams,
    pub tx_id: TxId,
    pub last_update_time: u64,
    pub work_address: Address,
    pub stake_address: Address,
}

impl NodeDetail {
    /// Same role, public ip and work key: a second Register is a no-op.
    pub fn is_registered(&self, role: StakerRole, params: &NodeParams) -> bool {
        self.role == role && self.params.public_ip == params.public_ip && self.params.work_key == params.work_key
    }

    /// Every network field unchanged: a Refresh is a no-op.
    pub fn is_repeated(&self, params: &NodeParams) -> bool {
        self.params == *params
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeDetailRegistry {
    details: StagedMap<Address, NodeDetail>,
}

impl NodeDetailRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<usize> {
        let records: Vec<NodeDetail> = scan_records(store, &detail_prefix())?;
        let n = records.len();
        self.details.clear_current();
        for d in records {
            self.details.insert_current(d.work_address, d);
        }
        debug!(count = n, "reload details");
        Ok(n)
    }

    pub fn get(&self, work_address: &Address) -> Option<&NodeDetail> {
        self.details.get(work_address)
    }

    pub fn put_detail(&mut self, detail: NodeDetail) {
        self.details.put(detail.work_address, detail);
    }

    pub fn del_detail(&mut self, work_address: &Address) {
        self.details.delete(work_address);
    }

    pub fn details(&self) -> Vec<&NodeDetail> {
        self.details.values()
    }

    /// Detail registered for a stake address, if any.
    pub fn by_stake_address(&self, stake_address: &Address) -> Option<&NodeDetail> {
        self.details.values().into_iter().find(|d| d.stake_address == *stake_address)
    }
}

impl SubLedger for NodeDetailRegistry {
    fn begin(&mut self) { self.details.begin() }
    fn rollback(&mut self) { self.details.rollback() }
    fn release(&mut self) { self.details.release() }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        self.details.stage_writes(batch, detail_key)
    }

    fn commit(&mut self) { self.details.commit() }
    fn abort(&mut self) { self.details.abort() }
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER WORKFLOWS
// ════════════════════════════════════════════════════════════════════════════

impl Ledger {
    /// Role of the live route/ser node signing with `address`, if any.
    pub fn is_valid_work_address(&self, address: &Address) -> Option<StakerRole> {
        let detail = self.details.get(address)?;
        let live = match detail.role {
            StakerRole::Route => self.stakers.is_route(&detail.stake_address),
            StakerRole::Service => self.stakers.is_ser(&detail.stake_address),
            StakerRole::Validator => false,
        };
        live.then_some(detail.role)
    }

    /// Store a detail under its work address. When `previous` names another
    /// work address (work key rotated), the old row is dropped.
    pub fn update_node_params(&mut self, detail: NodeDetail, previous: Option<Address>) {
        if let Some(prev) = previous.filter(|p| *p != detail.work_address) {
            self.details.del_detail(&prev);
            self.pows.move_pow(detail.role, &prev, detail.work_address);
            debug!(old = %prev, new = %detail.work_address, "work key rotated");
        }
        self.details.put_detail(detail);
    }
}
