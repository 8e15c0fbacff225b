//! # Ledger State Module
//!
//! Entry point and facade for the subnet ledger. [`Ledger`] composes the
//! sub-ledgers below; each one owns its current view plus a pending buffer
//! and is reloaded, journaled, staged and committed independently.
//!
//! ## Arsitektur
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         mod.rs (FACADE)                         │
//! │  - Ledger struct, TxContext                                     │
//! │  - new / reload / load_genesis                                  │
//! │  - execute / commit / abort                                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │  SysParams   │         │   Stakers    │         │    Proofs    │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │    Yields    │         │   Rewards    │         │ Subscribers  │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │  Fee Tiers   │         │ Node Details │         │   Actions    │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//!                                    │
//!                                    ▼
//!                    ┌──────────────────────────────┐
//!                    │  WriteBatch ──► KvStore      │
//!                    │  (applied only on commit)    │
//!                    └──────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `internal_staged` | `StagedMap` / `StagedValue` and the `SubLedger` contract |
//! | `internal_state_layout` | Store key encoding per sub-ledger |
//! | `internal_sys_params` | SystemParameters singleton, governance-mutable percentages |
//! | `internal_staking` | Staker registry, stake / unstake workflows |
//! | `internal_proof` | Proof meter per role and miner |
//! | `internal_yields` | Yield pool singleton |
//! | `internal_rewards` | Emission schedule, base / merit / yield rewards |
//! | `internal_subscribers` | Subscriber registry behind an LRU cache |
//! | `internal_fee_tiers` | Subscriber fee tiers |
//! | `internal_node_details` | Node network metadata keyed by work address |
//! | `internal_actions` | Governance actions and voter sets |
//! | `internal_governance` | Quorum rule and Govern execution |
//! | `internal_account` | Balances, stake balances, Set values |
//! | `internal_payload` | Per-variant transaction handlers |
//!
//! ## Transaction lifecycle
//!
//! 1. `execute` checks the envelope, opens a journal on every pending buffer
//!    and debits the fee.
//! 2. The payload handler validates and stages. On error every buffer
//!    replays its journal backwards; on success the journal is dropped.
//! 3. `commit` collects every sub-ledger's pending writes into one
//!    [`WriteBatch`], applies it atomically and only then folds pending into
//!    current. `abort` drops all pending state; the store is untouched.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::genesis::Genesis;
use crate::tx::TxEnvelope;
use crate::types::{Address, TxId};

// ════════════════════════════════════════════════════════════════════════════
// INTERNAL MODULES
// ════════════════════════════════════════════════════════════════════════════

/// Staged containers and the SubLedger trait
mod internal_staged;

/// Store key layout: prefix / delimiter / natural key
mod internal_state_layout;

/// SystemParameters: percentages, stake amounts, card prices, root/foundation
mod internal_sys_params;

/// Staker registry and DealStakeTx / DealUnStakeTx
mod internal_staking;

/// Proof meter: cumulative netflow and work time per miner
mod internal_proof;

/// Yield pool: total and undistributed subscriber yield
mod internal_yields;

/// Reward ledger and reward computation
mod internal_rewards;

/// Subscriber registry (LRU cached) and DealAddUserTx
mod internal_subscribers;

/// Fee tier catalog
mod internal_fee_tiers;

/// Node details and work address checks
mod internal_node_details;

/// Governance action registry
mod internal_actions;

/// Quorum rule, IsBeConfirmed, ProposalStatus, Govern
mod internal_governance;

/// Balances, stake balances, content-addressed values
mod internal_account;

/// Transaction execution: apply_payload
mod internal_payload;

#[cfg(test)]
mod tests;

// ════════════════════════════════════════════════════════════════════════════
// PUBLIC RE-EXPORTS
// ════════════════════════════════════════════════════════════════════════════

pub use internal_account::Accounts;
pub use internal_actions::{ActionRecord, ActionRegistry, ActionType};
pub use internal_fee_tiers::{FeeTier, FeeTierCatalog, TIER_ANNUAL, TIER_MONTH, TIER_SEASON};
pub use internal_governance::{is_confirmed, quorum, BOOTSTRAP_ROUTES};
pub use internal_node_details::{NodeDetail, NodeDetailRegistry, NodeParams};
pub use internal_payload::{
    MAX_SUBSCRIPTION_WINDOW, MIN_SUBSCRIPTION_WINDOW, PROOF_START_DELAY, UNSTAKE_EFFECTIVE_SECS,
};
pub use internal_proof::{
    PowRecord, ProofEntry, ProofMeterRegistry, MAX_NETFLOW, MAX_PROOF_INTERVAL, MIN_NETFLOW,
    MIN_PROOF_INTERVAL,
};
pub use internal_rewards::{reward_cur_year, Claimer, RewardGlobal, RewardLedger, RewardRecord};
pub use internal_staged::{Pending, StagedMap, StagedValue, SubLedger};
pub use internal_staking::{StakerRecord, StakerRegistry};
pub use internal_subscribers::{SubscriberRecord, SubscriberRegistry};
pub use internal_sys_params::{SysParamsLedger, SystemParameters, MAX_PERCENTAGE, MIN_PERCENTAGE};
pub use internal_yields::{YieldPool, YieldState};

use internal_state_layout::sys_params_key;

/// Per-transaction inputs supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub sender: Address,
    pub tx_id: TxId,
    pub block_time: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER
// ════════════════════════════════════════════════════════════════════════════

/// Aggregate ledger. Single writer: the host applies transactions one at a
/// time and calls `commit` or `abort` once per block.
#[derive(Debug)]
pub struct Ledger {
    genesis: Genesis,
    store: Arc<dyn KvStore>,

    sys_params: SysParamsLedger,
    stakers: StakerRegistry,
    rewards: RewardLedger,
    pows: ProofMeterRegistry,
    yields: YieldPool,
    users: SubscriberRegistry,
    user_types: FeeTierCatalog,
    details: NodeDetailRegistry,
    actions: ActionRegistry,
    accounts: Accounts,
}

impl Ledger {
    /// Empty ledger over `store`. Call [`Ledger::reload`] (and on a fresh
    /// store [`Ledger::load_genesis`]) before executing transactions.
    pub fn new(genesis: Genesis, store: Arc<dyn KvStore>, subscriber_cache_capacity: usize) -> Self {
        Ledger {
            sys_params: SysParamsLedger::new(&genesis),
            stakers: StakerRegistry::new(),
            rewards: RewardLedger::new(),
            pows: ProofMeterRegistry::new(),
            yields: YieldPool::new(),
            users: SubscriberRegistry::new(subscriber_cache_capacity),
            user_types: FeeTierCatalog::new(),
            details: NodeDetailRegistry::new(),
            actions: ActionRegistry::new(),
            accounts: Accounts::new(),
            genesis,
            store,
        }
    }

    /// Rebuild every current view from the store. Pending state is dropped.
    /// Actions whose end time is before `now` are skipped.
    pub fn reload(&mut self, now: u64) -> LedgerResult<()> {
        self.abort_all();
        let store = self.store.clone();
        let store = store.as_ref();

        let params = self.sys_params.reload(store)?;
        let stakers = self.stakers.reload(store)?;
        let rewards = self.rewards.reload(store)?;
        let pows = self.pows.reload(store)?;
        let yields = self.yields.reload(store)?;
        let users = self.users.reload(store)?;
        let user_types = self.user_types.reload(store)?;
        let details = self.details.reload(store)?;
        let actions = self.actions.reload(store, now)?;

        debug!(
            params, stakers, rewards, pows, yields, users, user_types, details, actions,
            "ledger reloaded"
        );
        Ok(())
    }

    /// Seed a fresh store: system parameters, fee tiers from the card prices
    /// and genesis allocations. A store that already holds system parameters
    /// is left alone. Returns the number of balances set; the caller commits.
    pub fn load_genesis(&mut self, airdrop: Option<&[u8]>) -> LedgerResult<usize> {
        self.genesis.verify()?;
        if self.store.get(&sys_params_key())?.is_some() {
            debug!("genesis already loaded");
            return Ok(0);
        }

        self.sys_params.stage_seed();
        if self.user_types.is_empty() {
            for tier in FeeTier::card_tiers(self.sys_params.params()) {
                self.user_types.add_user_type(tier);
            }
        }

        let allocations = self.genesis.allocations(airdrop)?;
        for (address, balance) in &allocations {
            self.accounts.set_balance(*address, *balance);
        }
        info!(symbol = %self.genesis.symbol, allocations = allocations.len(), "genesis loaded");
        Ok(allocations.len())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // EXECUTION
    // ════════════════════════════════════════════════════════════════════════════

    /// Execute one transaction. A failing transaction leaves no pending
    /// writes behind, fee included.
    pub fn execute(&mut self, env: &TxEnvelope, ctx: &TxContext) -> LedgerResult<()> {
        if env.base.magic != self.genesis.magic {
            return Err(LedgerError::InvalidMagic);
        }
        if env.base.price < self.genesis.min_price {
            return Err(LedgerError::InvalidPrice);
        }

        self.for_each_sub_ledger(|l| l.begin());
        match self.execute_inner(env, ctx) {
            Ok(()) => {
                self.for_each_sub_ledger(|l| l.release());
                debug!(tx = %ctx.tx_id, kind = env.payload.type_name(), sender = %ctx.sender, "tx executed");
                Ok(())
            }
            Err(e) => {
                self.for_each_sub_ledger(|l| l.rollback());
                warn!(tx = %ctx.tx_id, kind = env.payload.type_name(), sender = %ctx.sender, error = %e, "tx rejected");
                Err(e)
            }
        }
    }

    fn execute_inner(&mut self, env: &TxEnvelope, ctx: &TxContext) -> LedgerResult<()> {
        let fee = env.fee(&self.genesis)?;
        if fee > 0 {
            let store = self.store.clone();
            self.accounts.modify_balance(store.as_ref(), &ctx.sender, false, fee)?;
        }
        self.apply_payload(&env.payload, ctx)
    }

    fn for_each_sub_ledger(&mut self, mut f: impl FnMut(&mut dyn SubLedger)) {
        f(&mut self.sys_params);
        f(&mut self.stakers);
        f(&mut self.rewards);
        f(&mut self.pows);
        f(&mut self.yields);
        f(&mut self.users);
        f(&mut self.user_types);
        f(&mut self.details);
        f(&mut self.actions);
        f(&mut self.accounts);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // COMMIT / ABORT
    // ════════════════════════════════════════════════════════════════════════════

    /// Persist every pending write in one atomic batch, then fold pending
    /// into current. If the store write fails nothing is folded and pending
    /// state is kept, so the host may retry or abort.
    pub fn commit(&mut self) -> LedgerResult<usize> {
        let mut batch = WriteBatch::new();
        self.sys_params.stage_writes(&mut batch)?;
        self.stakers.stage_writes(&mut batch)?;
        self.rewards.stage_writes(&mut batch)?;
        self.pows.stage_writes(&mut batch)?;
        self.yields.stage_writes(&mut batch)?;
        self.users.stage_writes(&mut batch)?;
        self.user_types.stage_writes(&mut batch)?;
        self.details.stage_writes(&mut batch)?;
        self.actions.stage_writes(&mut batch)?;
        self.accounts.stage_writes(&mut batch)?;

        let ops = batch.len();
        if !batch.is_empty() {
            self.store.write(batch)?;
        }

        self.sys_params.commit();
        self.stakers.commit();
        self.rewards.commit();
        self.pows.commit();
        self.yields.commit();
        self.users.commit();
        self.user_types.commit();
        self.details.commit();
        self.actions.commit();
        self.accounts.commit();

        info!(ops, "ledger committed");
        Ok(ops)
    }

    /// Drop every pending write. Current views and the store are unchanged.
    pub fn abort(&mut self) {
        self.abort_all();
        info!("ledger aborted");
    }

    fn abort_all(&mut self) {
        self.for_each_sub_ledger(|l| l.abort());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ════════════════════════════════════════════════════════════════════════════

    pub fn genesis(&self) -> &Genesis {
        &self.genesis
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn params(&self) -> &SystemParameters {
        self.sys_params.params()
    }

    pub fn sys_params(&self) -> &SysParamsLedger {
        &self.sys_params
    }

    pub fn stakers(&self) -> &StakerRegistry {
        &self.stakers
    }

    pub fn stakers_mut(&mut self) -> &mut StakerRegistry {
        &mut self.stakers
    }

    pub fn rewards(&self) -> &RewardLedger {
        &self.rewards
    }

    pub fn rewards_mut(&mut self) -> &mut RewardLedger {
        &mut self.rewards
    }

    pub fn pows(&self) -> &ProofMeterRegistry {
        &self.pows
    }

    pub fn pows_mut(&mut self) -> &mut ProofMeterRegistry {
        &mut self.pows
    }

    pub fn yields(&self) -> &YieldPool {
        &self.yields
    }

    pub fn users(&self) -> &SubscriberRegistry {
        &self.users
    }

    pub fn users_mut(&mut self) -> &mut SubscriberRegistry {
        &mut self.users
    }

    /// Subscriber lookup through the cache.
    pub fn user(&self, address: &Address) -> LedgerResult<Option<SubscriberRecord>> {
        self.users.get(self.store.as_ref(), address)
    }

    pub fn user_types(&self) -> &FeeTierCatalog {
        &self.user_types
    }

    pub fn user_types_mut(&mut self) -> &mut FeeTierCatalog {
        &mut self.user_types
    }

    pub fn details(&self) -> &NodeDetailRegistry {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut NodeDetailRegistry {
        &mut self.details
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionRegistry {
        &mut self.actions
    }

    pub fn balance(&self, address: &Address) -> LedgerResult<u64> {
        self.accounts.balance(self.store.as_ref(), address)
    }

    pub fn stake_balance(&self, address: &Address) -> LedgerResult<u64> {
        self.accounts.stake_balance(self.store.as_ref(), address)
    }

    /// Value stored by a Set transaction under its keccak256 hash.
    pub fn value(&self, hash: &[u8; 32]) -> LedgerResult<Option<Vec<u8>>> {
        self.accounts.value(self.store.as_ref(), hash)
    }

    /// Host-side balance adjustment outside any transaction (airdrops,
    /// test fixtures).
    pub fn set_balance(&mut self, address: Address, amount: u64) {
        self.accounts.set_balance(address, amount);
    }
}
