//! # Governance Quorum
//!
//! Confirmation rule for open actions, selected by the number of staked route
//! nodes:
//!
//! | Route count | Mode | Confirmed when |
//! |-------------|------|----------------|
//! | `< 3` | bootstrap | root address is among the voters |
//! | `>= 3` | steady state | `voters >= floor(2 * routes / 3)` |
//!
//! A confirmed action is applied by Govern within seven days after its end
//! time. Percentage actions go through `modify_params`; user-type actions
//! insert or reprice a fee tier.

use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::types::{ActionId, Address, TxId, SECONDS_7_DAY};

use super::internal_actions::{ActionRecord, ActionType};
use super::internal_fee_tiers::FeeTier;
use super::Ledger;

/// Route count from which steady-state quorum applies.
pub const BOOTSTRAP_ROUTES: usize = 3;

pub fn quorum(route_count: usize) -> usize {
    route_count * 2 / 3
}

/// Pure confirmation rule.
pub fn is_confirmed(voters: &[Address], route_count: usize, root: &Address) -> bool {
    if route_count < BOOTSTRAP_ROUTES {
        voters.contains(root)
    } else {
        voters.len() >= quorum(route_count)
    }
}

pub(crate) fn parse_u64(s: &str) -> LedgerResult<u64> {
    s.trim().parse::<u64>().map_err(|_| LedgerError::ParamValue(s.to_string()))
}

impl Ledger {
    fn action_confirmed(&self, action: &ActionRecord) -> bool {
        let params = self.sys_params.params();
        is_confirmed(&action.voters, self.stakers.stakers_num().0, &params.root_address)
    }

    /// Id of the confirmed, still open action of `action_type` for `key`.
    pub fn is_be_confirmed(&self, action_type: ActionType, key: &str, now: u64) -> Option<ActionId> {
        let (_, id) = self.actions.voters_num(action_type, key, now)?;
        let action = self.actions.get_live(&id, now).ok().flatten()?;
        self.action_confirmed(action).then_some(id)
    }

    pub fn proposal_status(&self, id: &ActionId, now: u64) -> LedgerResult<bool> {
        let action = self.actions.get_live(id, now)?.ok_or(LedgerError::ActionNotFound)?;
        Ok(self.action_confirmed(action))
    }

    /// Voters an action opened by `sender` starts with.
    pub(crate) fn initial_voters(&self, sender: &Address) -> Vec<Address> {
        let root = self.sys_params.params().root_address;
        let routes = self.stakers.stakers_num().0;
        if (*sender == root && routes < BOOTSTRAP_ROUTES) || self.stakers.is_route(sender) {
            vec![*sender]
        } else {
            Vec::new()
        }
    }

    /// Apply a confirmed action.
    pub(crate) fn govern_action(&mut self, id: &ActionId, tx_id: TxId, now: u64) -> LedgerResult<()> {
        let action = self.actions.get(id).cloned().ok_or(LedgerError::ActionNotFound)?;
        if now > action.end_time.saturating_add(SECONDS_7_DAY) {
            return Err(LedgerError::GraceExpired);
        }
        if !self.action_confirmed(&action) {
            return Err(LedgerError::ActionNotConfirmed);
        }

        match action.action_type {
            ActionType::ModifySysParam | ActionType::ModifyFoundation => {
                self.sys_params.modify_params(&action.key, &action.new_value, tx_id, now)?;
            }
            ActionType::AddUserType | ActionType::ModifyUserType => {
                let tier_id = parse_u64(&action.key)?;
                let fee = parse_u64(&action.new_value)?;
                let name = self.user_types.get(tier_id).map(|t| t.name.clone()).unwrap_or_default();
                self.user_types.add_user_type(FeeTier { name, id: tier_id, fee });
            }
            ActionType::AddStaker => return Err(LedgerError::ActionType),
        }
        info!(action = %id, kind = %action.action_type, key = %action.key, value = %action.new_value, "action governed");
        Ok(())
    }
}
