//! # Payload Execution
//!
//! One handler per [`TxPayload`] variant. Handlers only validate and stage;
//! the caller journals their writes so a failing handler leaves no
//! pending writes behind.
//!
//! Validation order inside each handler is part of the observable behavior:
//! the first failing gate decides the error the submitter sees.

use tracing::debug;

use crate::crypto::work_address_from_key;
use crate::error::{LedgerError, LedgerResult};
use crate::tx::TxPayload;
use crate::types::{ActionId, Address, StakerRole, SECONDS_7_DAY, SECONDS_DAY, SECONDS_MINUTE};

use super::internal_actions::{ActionRecord, ActionType};
use super::internal_governance::parse_u64;
use super::internal_node_details::{NodeDetail, NodeParams};
use super::internal_proof::{ProofEntry, MAX_NETFLOW, MAX_PROOF_INTERVAL, MIN_NETFLOW, MIN_PROOF_INTERVAL};
use super::internal_rewards::Claimer;
use super::internal_staking::StakerRecord;
use super::internal_subscribers::SubscriberRecord;
use super::{Ledger, TxContext};

/// Width of the UnStake settlement window after `end_time`.
pub const UNSTAKE_EFFECTIVE_SECS: u64 = 100;
/// A proof must start at least this long before the block.
pub const PROOF_START_DELAY: u64 = 50;
pub const MAX_SUBSCRIPTION_WINDOW: u64 = 31 * SECONDS_DAY;
pub const MIN_SUBSCRIPTION_WINDOW: u64 = 28 * SECONDS_DAY;

impl Ledger {
    pub(crate) fn apply_payload(&mut self, payload: &TxPayload, ctx: &TxContext) -> LedgerResult<()> {
        match payload {
            TxPayload::Set { value } => self.apply_set(value),
            TxPayload::Transfer { to, units } => self.apply_transfer(ctx, to, *units),
            TxPayload::Stake { staker_type, stake_amount, staker_addr } => {
                self.apply_stake(ctx, *staker_type, *stake_amount, staker_addr)
            }
            TxPayload::UnStake { staker_type, reward_amount, end_time } => {
                self.apply_unstake(ctx, *staker_type, *reward_amount, *end_time)
            }
            TxPayload::AddUser { start_time, end_time, pay_amount, connections, user_type, address } => {
                let user = SubscriberRecord {
                    start_time: *start_time,
                    end_time: *end_time,
                    connections: *connections,
                    pay_amount: *pay_amount,
                    tx_ids: Vec::new(),
                    user_type: *user_type,
                    address: *address,
                };
                self.apply_add_user(ctx, user)
            }
            TxPayload::Govern { action_id } => self.govern_action(action_id, ctx.tx_id, ctx.block_time),
            TxPayload::Proof { netflow, start_time, end_time, .. } => {
                self.apply_proof(ctx, *netflow, *start_time, *end_time)
            }
            TxPayload::Claim { reward_amount, end_time } => self.apply_claim(ctx, *reward_amount, *end_time),
            TxPayload::Register { action_id, staker_type, params, staker_addr } => {
                self.apply_register(ctx, action_id, *staker_type, params, staker_addr)
            }
            TxPayload::Refresh { params } => self.apply_refresh(ctx, params),
            TxPayload::Withdrawn { action_id } => self.apply_withdrawn(ctx, action_id),
            TxPayload::Vote { action_id } => self.apply_vote(ctx, action_id),
            TxPayload::Proposal { action_id, action_type, key, new_value, .. } => {
                self.apply_proposal(ctx, action_id, *action_type, key, new_value)
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // ACCOUNTS
    // ════════════════════════════════════════════════════════════════════════════

    fn apply_set(&mut self, value: &[u8]) -> LedgerResult<()> {
        if value.is_empty() {
            return Err(LedgerError::ValueEmpty);
        }
        if value.len() as u64 > self.genesis.max_value_size {
            return Err(LedgerError::ValueTooBig);
        }
        self.accounts.put_value(value.to_vec());
        Ok(())
    }

    fn apply_transfer(&mut self, ctx: &TxContext, to: &Address, units: u64) -> LedgerResult<()> {
        if units == 0 || to.is_zero() {
            return Err(LedgerError::NonActionable);
        }
        let store = self.store.clone();
        self.accounts.modify_balance(store.as_ref(), &ctx.sender, false, units)?;
        self.accounts.modify_balance(store.as_ref(), to, true, units)?;
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // STAKING
    // ════════════════════════════════════════════════════════════════════════════

    fn apply_stake(&mut self, ctx: &TxContext, staker_type: u64, amount: u64, staker_addr: &Address) -> LedgerResult<()> {
        let role = StakerRole::from_u64(staker_type).ok_or(LedgerError::StakerType)?;
        if !self.sys_params.params().stake_amount_ok(role, amount) {
            return Err(LedgerError::StakeAmount);
        }
        if staker_addr.is_zero() {
            return Err(LedgerError::NonActionable);
        }
        // stake balance, staker record and UnStake all live on one address
        if *staker_addr != ctx.sender {
            return Err(LedgerError::StakerSender);
        }
        if self.stakers.is_staker(staker_addr).is_some() {
            return Err(LedgerError::AlreadyStaker);
        }
        let action_id = self
            .is_be_confirmed(ActionType::AddStaker, &staker_addr.to_prefixed_hex(), ctx.block_time)
            .ok_or(LedgerError::NotConfirmed)?;

        let store = self.store.clone();
        self.accounts.modify_balance(store.as_ref(), &ctx.sender, false, amount)?;
        self.accounts.modify_stake_balance(store.as_ref(), &ctx.sender, true, amount)?;

        self.deal_stake_tx(StakerRecord {
            tx_id: ctx.tx_id,
            role,
            amount,
            stake_time: ctx.block_time,
            address: *staker_addr,
        })?;
        self.actions.del_action(&action_id);
        Ok(())
    }

    fn apply_unstake(&mut self, ctx: &TxContext, staker_type: u64, reward_amount: u64, end_time: u64) -> LedgerResult<()> {
        let role = match StakerRole::from_u64(staker_type) {
            Some(r @ (StakerRole::Route | StakerRole::Service)) => r,
            _ => return Err(LedgerError::StakerType),
        };
        let now = ctx.block_time;
        if now > end_time.saturating_add(UNSTAKE_EFFECTIVE_SECS) {
            return Err(LedgerError::EndTimeTooEarly);
        }
        if now < end_time {
            return Err(LedgerError::EndTimeTooLate);
        }
        let staker = self.stakers.get(role, &ctx.sender).cloned().ok_or(LedgerError::StakerNotFound)?;
        let min_stake = self.sys_params.params().min_stake_time;
        if now < staker.stake_time.saturating_add(min_stake) {
            return Err(LedgerError::StakeTimeTooShort(min_stake / SECONDS_DAY));
        }

        let store = self.store.clone();
        self.accounts.modify_stake_balance(store.as_ref(), &ctx.sender, false, staker.amount)?;

        let (base, merit, yield_reward) = self.calc_reward(Claimer::Staker(role), &ctx.sender, end_time)?;
        let total = base.saturating_add(merit).saturating_add(yield_reward);
        if reward_amount != total {
            return Err(LedgerError::RewardMismatch);
        }
        let payout = staker.amount.checked_add(total).ok_or(LedgerError::Overflow)?;
        self.accounts.modify_balance(store.as_ref(), &ctx.sender, true, payout)?;

        self.deal_unstake_tx(role, &ctx.sender, ctx.tx_id, end_time)
    }

    fn apply_claim(&mut self, ctx: &TxContext, reward_amount: u64, end_time: u64) -> LedgerResult<()> {
        let claimer = self.check_claim_address(&ctx.sender).ok_or(LedgerError::NotClaimer)?;
        let now = ctx.block_time;
        if now.saturating_sub(self.rewards.last_claim_time(&ctx.sender)) < SECONDS_7_DAY {
            return Err(LedgerError::ClaimInterval);
        }
        let create = self.sys_params.params().chain_create_time;
        let aligned = (now.saturating_sub(create) / SECONDS_DAY) * SECONDS_DAY + create;
        if aligned != end_time && aligned != end_time.saturating_add(1) {
            return Err(LedgerError::ClaimEndTime);
        }

        let (base, merit, yield_reward) = self.calc_reward(claimer, &ctx.sender, end_time)?;
        let total = base.saturating_add(merit).saturating_add(yield_reward);
        if reward_amount != total {
            return Err(LedgerError::RewardMismatch);
        }
        let store = self.store.clone();
        self.accounts.modify_balance(store.as_ref(), &ctx.sender, true, total)?;

        match claimer {
            Claimer::Foundation => self.update_foundation_reward(&ctx.sender, ctx.tx_id, end_time),
            Claimer::Staker(role) => self.update_staker_reward(role, &ctx.sender, ctx.tx_id, end_time),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // SUBSCRIBERS
    // ════════════════════════════════════════════════════════════════════════════

    fn apply_add_user(&mut self, ctx: &TxContext, user: SubscriberRecord) -> LedgerResult<()> {
        let now = ctx.block_time;
        if user.start_time > user.end_time {
            return Err(LedgerError::StartAfterEnd);
        }
        let window = user.end_time - user.start_time;
        if window > MAX_SUBSCRIPTION_WINDOW {
            return Err(LedgerError::WindowTooLong);
        }
        if window < MIN_SUBSCRIPTION_WINDOW {
            return Err(LedgerError::WindowTooShort);
        }
        if user.start_time < now.saturating_sub(SECONDS_MINUTE) {
            return Err(LedgerError::StartTime);
        }
        if user.address.is_zero() {
            return Err(LedgerError::NonActionable);
        }
        if !self.user_types.check_user_type(user.user_type) {
            return Err(LedgerError::UserType);
        }
        if !self.check_pay_amount(user.user_type, user.pay_amount, user.start_time, user.end_time) {
            return Err(LedgerError::PayAmount);
        }
        let store = self.store.clone();
        if let Some(prev) = self.users.get(store.as_ref(), &user.address)? {
            if prev.end_time > now.saturating_add(SECONDS_MINUTE) {
                return Err(LedgerError::UserExists);
            }
        }

        self.accounts.modify_balance(store.as_ref(), &ctx.sender, false, user.pay_amount)?;
        self.deal_add_user_tx(ctx.tx_id, now, user)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // NODES
    // ════════════════════════════════════════════════════════════════════════════

    fn apply_proof(&mut self, ctx: &TxContext, netflow: u64, start_time: u64, end_time: u64) -> LedgerResult<()> {
        let role = self.is_valid_work_address(&ctx.sender).ok_or(LedgerError::NotWorkNode)?;
        let now = ctx.block_time;
        if netflow < MIN_NETFLOW {
            return Err(LedgerError::NetflowTooSmall);
        }
        if netflow > MAX_NETFLOW {
            return Err(LedgerError::NetflowTooBig);
        }
        if start_time > end_time {
            return Err(LedgerError::StartAfterEnd);
        }
        if start_time > now.saturating_sub(PROOF_START_DELAY) {
            return Err(LedgerError::StartTime);
        }
        if end_time > now {
            return Err(LedgerError::ProofEndTime);
        }
        let interval = end_time - start_time;
        if interval < MIN_PROOF_INTERVAL {
            return Err(LedgerError::IntervalTooSmall);
        }
        if interval > MAX_PROOF_INTERVAL {
            return Err(LedgerError::IntervalTooBig);
        }

        self.pows.put_pow(
            role,
            ProofEntry {
                netflow,
                work_time: interval,
                miner: ctx.sender,
                tx_id: ctx.tx_id,
                update_time: now,
            },
        )
    }

    fn apply_register(
        &mut self,
        ctx: &TxContext,
        action_id: &ActionId,
        staker_type: u64,
        params: &NodeParams,
        staker_addr: &Address,
    ) -> LedgerResult<()> {
        if staker_addr.is_zero() {
            return Err(LedgerError::NonActionable);
        }
        let role = StakerRole::from_u64(staker_type).ok_or(LedgerError::StakerType)?;
        let work_address = work_address_from_key(&params.work_key).map_err(|e| LedgerError::WorkKey(e.to_string()))?;
        if self.stakers.is_staker(staker_addr).is_some() {
            return Err(LedgerError::AlreadyStaker);
        }
        if let Some(existing) = self.details.get(&work_address) {
            if existing.role != role {
                return Err(LedgerError::DetailRole);
            }
            if existing.is_registered(role, params) {
                return Err(LedgerError::Repeated);
            }
        }

        let key = staker_addr.to_prefixed_hex();
        let now = ctx.block_time;
        let mut stale = Vec::new();
        for other in self.actions.by_key(ActionType::AddStaker, &key) {
            if other.action_id == *action_id {
                continue;
            }
            if other.end_time >= now {
                return Err(LedgerError::ProposalRepeat("key exist curActions"));
            }
            stale.push(other.action_id);
        }
        let mut action = match self.actions.get(action_id) {
            Some(a) if a.action_type != ActionType::AddStaker || a.key != key => {
                return Err(LedgerError::ActionExists);
            }
            // same registration while its action is open: keep the votes
            Some(a) if a.end_time >= now => a.clone(),
            _ => ActionRecord {
                action_id: *action_id,
                action_type: ActionType::AddStaker,
                start_time: now,
                end_time: now + SECONDS_7_DAY,
                tx_ids: Vec::new(),
                voters: Vec::new(),
                key,
                new_value: String::new(),
            },
        };
        action.tx_ids.push(ctx.tx_id);
        for voter in self.initial_voters(&ctx.sender) {
            if !action.has_voter(&voter) {
                action.voters.push(voter);
            }
        }
        for id in &stale {
            self.actions.del_action(id);
        }
        self.actions.put_action(action);

        let previous = self.details.by_stake_address(staker_addr).map(|d| d.work_address);
        self.update_node_params(
            NodeDetail {
                role,
                params: params.clone(),
                tx_id: ctx.tx_id,
                last_update_time: ctx.block_time,
                work_address,
                stake_address: *staker_addr,
            },
            previous,
        );
        debug!(action = %action_id, staker = %staker_addr, work = %work_address, role = %role, "node registered");
        Ok(())
    }

    fn apply_refresh(&mut self, ctx: &TxContext, params: &NodeParams) -> LedgerResult<()> {
        if self.is_valid_work_address(&ctx.sender).is_none() {
            return Err(LedgerError::NotWorkNode);
        }
        let existing = self.details.get(&ctx.sender).cloned().ok_or(LedgerError::DetailNotFound)?;
        if existing.is_repeated(params) {
            return Err(LedgerError::Repeated);
        }
        let work_address = if params.work_key == existing.params.work_key {
            ctx.sender
        } else {
            work_address_from_key(&params.work_key).map_err(|e| LedgerError::WorkKey(e.to_string()))?
        };
        self.update_node_params(
            NodeDetail {
                role: existing.role,
                params: params.clone(),
                tx_id: ctx.tx_id,
                last_update_time: ctx.block_time,
                work_address,
                stake_address: existing.stake_address,
            },
            Some(ctx.sender),
        );
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // GOVERNANCE
    // ════════════════════════════════════════════════════════════════════════════

    fn apply_proposal(
        &mut self,
        ctx: &TxContext,
        action_id: &ActionId,
        action_type: u64,
        key: &str,
        new_value: &str,
    ) -> LedgerResult<()> {
        if self.actions.get(action_id).is_some() {
            return Err(LedgerError::ActionExists);
        }
        let kind = match ActionType::from_u64(action_type) {
            Some(k @ (ActionType::ModifySysParam | ActionType::ModifyFoundation)) => {
                self.sys_params.comp_cur_param(key, new_value)?;
                k
            }
            Some(ActionType::AddUserType) => {
                if self.user_types.check_user_type(parse_u64(key)?) {
                    return Err(LedgerError::UserTypeExists);
                }
                ActionType::AddUserType
            }
            Some(ActionType::ModifyUserType) => {
                let tier = parse_u64(key)?;
                let fee = parse_u64(new_value)?;
                if !self.user_types.check_user_type(tier) {
                    return Err(LedgerError::UserTypeMissing);
                }
                if self.user_types.check_fee(tier, fee) {
                    return Err(LedgerError::FeeUnchanged);
                }
                ActionType::ModifyUserType
            }
            _ => return Err(LedgerError::UnknownActionType),
        };
        self.actions.proposal_repeat(action_id, key)?;

        let voters = self.initial_voters(&ctx.sender);
        self.actions.put_action(ActionRecord {
            action_id: *action_id,
            action_type: kind,
            start_time: ctx.block_time,
            end_time: ctx.block_time + SECONDS_7_DAY,
            tx_ids: vec![ctx.tx_id],
            voters,
            key: key.to_string(),
            new_value: new_value.to_string(),
        });
        Ok(())
    }

    fn apply_vote(&mut self, ctx: &TxContext, action_id: &ActionId) -> LedgerResult<()> {
        if !self.stakers.is_route(&ctx.sender) {
            if ctx.sender != self.sys_params.params().root_address {
                return Err(LedgerError::NotRoute);
            }
            if self.stakers.stakers_num().0 > 3 {
                return Err(LedgerError::NoPermission);
            }
        }
        let mut action = self
            .actions
            .get_live(action_id, ctx.block_time)?
            .cloned()
            .ok_or(LedgerError::ActionNotFound)?;
        if action.has_voter(&ctx.sender) {
            return Err(LedgerError::VoterExists);
        }
        action.tx_ids.push(ctx.tx_id);
        action.voters.push(ctx.sender);
        self.actions.put_action(action);
        Ok(())
    }

    fn apply_withdrawn(&mut self, ctx: &TxContext, action_id: &ActionId) -> LedgerResult<()> {
        if !self.stakers.is_route(&ctx.sender) {
            return Err(LedgerError::NotRoute);
        }
        let mut action = self
            .actions
            .get_live(action_id, ctx.block_time)?
            .cloned()
            .ok_or(LedgerError::ActionNotFound)?;
        action.remove_voter(&ctx.sender);
        action.tx_ids.push(ctx.tx_id);
        self.actions.put_action(action);
        Ok(())
    }
}
