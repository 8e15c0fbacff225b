//! Transaction envelope, the closed payload set, fee units, the activity
//! projection and the JSON input decoder.
//!
//! | Tag | Variant | Fee units |
//! |-----|---------|-----------|
//! | `set` | Set | base + ceil(len / value_unit_size) |
//! | `transfer` | Transfer | base |
//! | `stake` | Stake | base |
//! | `unstake` | UnStake | base |
//! | `addUser` | AddUser | base |
//! | `govern` | Govern | base |
//! | `proof` | Proof | 0 |
//! | `claim` | Claim | base |
//! | `register` | Register | base |
//! | `refresh` | Refresh | 0 |
//! | `withdrawn` | Withdrawn | base |
//! | `vote` | Vote | base |
//! | `proposal` | Proposal | base |

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::genesis::Genesis;
use crate::state::NodeParams;
use crate::types::{ActionId, Address, TxId};

/// Block reference carried by every transaction.
pub type BlockId = TxId;

pub const TX_SET: &str = "set";
pub const TX_TRANSFER: &str = "transfer";
pub const TX_STAKE: &str = "stake";
pub const TX_UNSTAKE: &str = "unstake";
pub const TX_ADD_USER: &str = "addUser";
pub const TX_GOVERN: &str = "govern";
pub const TX_PROOF: &str = "proof";
pub const TX_CLAIM: &str = "claim";
pub const TX_REGISTER: &str = "register";
pub const TX_REFRESH: &str = "refresh";
pub const TX_WITHDRAWN: &str = "withdrawn";
pub const TX_VOTE: &str = "vote";
pub const TX_PROPOSAL: &str = "proposal";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BaseTx {
    pub magic: u64,
    pub price: u64,
    #[serde(rename = "blockID")]
    pub block_id: BlockId,
}

/// Payload variants. Role and action-type fields keep their wire integers so
/// that out-of-range values are rejected by execution, not by decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPayload {
    Set {
        value: Vec<u8>,
    },
    Transfer {
        to: Address,
        units: u64,
    },
    Stake {
        staker_type: u64,
        stake_amount: u64,
        staker_addr: Address,
    },
    UnStake {
        staker_type: u64,
        reward_amount: u64,
        end_time: u64,
    },
    AddUser {
        start_time: u64,
        end_time: u64,
        pay_amount: u64,
        connections: u64,
        user_type: u64,
        address: Address,
    },
    Govern {
        action_id: ActionId,
    },
    Proof {
        netflow: u64,
        start_time: u64,
        end_time: u64,
        ser: Address,
    },
    Claim {
        reward_amount: u64,
        end_time: u64,
    },
    Register {
        action_id: ActionId,
        staker_type: u64,
        params: NodeParams,
        staker_addr: Address,
    },
    Refresh {
        params: NodeParams,
    },
    Withdrawn {
        action_id: ActionId,
    },
    Vote {
        action_id: ActionId,
    },
    Proposal {
        action_id: ActionId,
        start_time: u64,
        end_time: u64,
        action_type: u64,
        key: String,
        new_value: String,
    },
}

fn value_units(g: &Genesis, size: u64) -> u64 {
    let unit = g.value_unit_size.max(1);
    size.div_ceil(unit)
}

impl TxPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            TxPayload::Set { .. } => TX_SET,
            TxPayload::Transfer { .. } => TX_TRANSFER,
            TxPayload::Stake { .. } => TX_STAKE,
            TxPayload::UnStake { .. } => TX_UNSTAKE,
            TxPayload::AddUser { .. } => TX_ADD_USER,
            TxPayload::Govern { .. } => TX_GOVERN,
            TxPayload::Proof { .. } => TX_PROOF,
            TxPayload::Claim { .. } => TX_CLAIM,
            TxPayload::Register { .. } => TX_REGISTER,
            TxPayload::Refresh { .. } => TX_REFRESH,
            TxPayload::Withdrawn { .. } => TX_WITHDRAWN,
            TxPayload::Vote { .. } => TX_VOTE,
            TxPayload::Proposal { .. } => TX_PROPOSAL,
        }
    }

    pub fn fee_units(&self, g: &Genesis) -> u64 {
        match self {
            TxPayload::Set { value } => g.base_tx_units.saturating_add(value_units(g, value.len() as u64)),
            TxPayload::Proof { .. } | TxPayload::Refresh { .. } => 0,
            _ => g.base_tx_units,
        }
    }

    /// Project the payload into an activity log row.
    pub fn activity(&self, timestamp: i64, tx_id: TxId, sender: &Address) -> Activity {
        let mut a = Activity {
            timestamp,
            tx_id,
            typ: self.type_name().to_string(),
            sender: Some(sender.to_prefixed_hex()),
            ..Activity::default()
        };
        match self {
            TxPayload::Set { value } => {
                a.key = Some(crate::crypto::keccak256_hex(value));
                a.units = Some(value.len() as u64);
            }
            TxPayload::Transfer { to, units } => {
                a.to = Some(to.to_prefixed_hex());
                a.units = Some(*units);
            }
            TxPayload::Stake { staker_type, stake_amount, staker_addr } => {
                a.staker_type = Some(*staker_type);
                a.stake_amount = Some(*stake_amount);
                a.staker_addr = Some(staker_addr.to_prefixed_hex());
            }
            TxPayload::UnStake { staker_type, reward_amount, end_time } => {
                a.staker_type = Some(*staker_type);
                a.reward_amount = Some(*reward_amount);
                a.end_time = Some(*end_time);
            }
            TxPayload::AddUser { start_time, end_time, pay_amount, connections, user_type, address } => {
                a.start_time = Some(*start_time);
                a.end_time = Some(*end_time);
                a.pay_amount = Some(*pay_amount);
                a.connections = Some(*connections);
                a.user_type = Some(*user_type);
                a.address = Some(address.to_prefixed_hex());
            }
            TxPayload::Govern { action_id } | TxPayload::Vote { action_id } | TxPayload::Withdrawn { action_id } => {
                a.action_id = Some(*action_id);
            }
            TxPayload::Proof { netflow, start_time, end_time, ser } => {
                a.netflow = Some(*netflow);
                a.start_time = Some(*start_time);
                a.end_time = Some(*end_time);
                a.address = Some(ser.to_prefixed_hex());
            }
            TxPayload::Claim { reward_amount, end_time } => {
                a.reward_amount = Some(*reward_amount);
                a.end_time = Some(*end_time);
            }
            TxPayload::Register { action_id, staker_type, params, staker_addr } => {
                a.action_id = Some(*action_id);
                a.staker_type = Some(*staker_type);
                a.staker_addr = Some(staker_addr.to_prefixed_hex());
                a.set_node_params(params);
            }
            TxPayload::Refresh { params } => a.set_node_params(params),
            TxPayload::Proposal { action_id, start_time, end_time, action_type, key, new_value } => {
                a.action_id = Some(*action_id);
                a.start_time = Some(*start_time);
                a.end_time = Some(*end_time);
                a.action_type = Some(*action_type);
                a.key = Some(key.clone());
                a.value = Some(new_value.clone());
            }
        }
        a
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEnvelope {
    pub base: BaseTx,
    pub payload: TxPayload,
}

impl TxEnvelope {
    pub fn new(base: BaseTx, payload: TxPayload) -> Self {
        TxEnvelope { base, payload }
    }

    pub fn fee_units(&self, g: &Genesis) -> u64 {
        self.payload.fee_units(g)
    }

    /// Amount debited from the sender before the payload runs.
    pub fn fee(&self, g: &Genesis) -> LedgerResult<u64> {
        self.fee_units(g).checked_mul(self.base.price).ok_or(LedgerError::Overflow)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ACTIVITY
// ════════════════════════════════════════════════════════════════════════════

/// Flat, read-only view of an executed transaction for the service layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub timestamp: i64,
    pub tx_id: TxId,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staker_type: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stake_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staker_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "actionID", skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netflow: Option<u64>,
    #[serde(rename = "localIP", skip_serializing_if = "Option::is_none")]
    pub local_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_port: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_port: Option<u64>,
    #[serde(rename = "publicIP", skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_port: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<u64>,
}

impl Activity {
    fn set_node_params(&mut self, p: &NodeParams) {
        self.country = Some(p.country.clone());
        self.local_ip = Some(p.local_ip.clone());
        self.public_ip = Some(p.public_ip.clone());
        self.min_port = Some(p.min_port);
        self.max_port = Some(p.max_port);
        self.check_port = Some(p.check_port);
        self.work_key = Some(p.work_key.clone());
    }
}

// ════════════════════════════════════════════════════════════════════════════
// INPUT DECODER
// ════════════════════════════════════════════════════════════════════════════

/// Flat JSON form submitted by clients. `type` selects the variant; fields
/// a variant does not use are ignored. `value` is hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TxInput {
    #[serde(rename = "type")]
    pub typ: String,
    pub key: String,
    pub value: String,
    pub to: Address,
    pub units: u64,
    pub staker_type: u64,
    pub staker_addr: Address,
    pub stake_amount: u64,
    pub reward_amount: u64,
    #[serde(rename = "actionID")]
    pub action_id: ActionId,
    pub action_type: u64,
    #[serde(rename = "localIP")]
    pub local_ip: String,
    pub min_port: u64,
    pub max_port: u64,
    #[serde(rename = "publicIP")]
    pub public_ip: String,
    pub check_port: u64,
    pub netflow: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub ser: Address,
    pub new_value: String,
    pub country: String,
    pub work_key: String,
    pub pay_amount: u64,
    pub connections: u64,
    pub user_type: u64,
    pub address: Address,
}

impl TxInput {
    fn node_params(&self) -> NodeParams {
        NodeParams {
            country: self.country.clone(),
            local_ip: self.local_ip.clone(),
            public_ip: self.public_ip.clone(),
            min_port: self.min_port,
            max_port: self.max_port,
            check_port: self.check_port,
            work_key: self.work_key.clone(),
        }
    }

    pub fn decode(&self) -> LedgerResult<TxPayload> {
        let payload = match self.typ.as_str() {
            TX_SET => {
                let raw = self.value.strip_prefix("0x").unwrap_or(&self.value);
                let value = hex::decode(raw).map_err(|e| LedgerError::InvalidInput(format!("value: {}", e)))?;
                TxPayload::Set { value }
            }
            TX_TRANSFER => TxPayload::Transfer { to: self.to, units: self.units },
            TX_STAKE => TxPayload::Stake {
                staker_type: self.staker_type,
                stake_amount: self.stake_amount,
                staker_addr: self.staker_addr,
            },
            TX_UNSTAKE => TxPayload::UnStake {
                staker_type: self.staker_type,
                reward_amount: self.reward_amount,
                end_time: self.end_time,
            },
            TX_ADD_USER => TxPayload::AddUser {
                start_time: self.start_time,
                end_time: self.end_time,
                pay_amount: self.pay_amount,
                connections: self.connections,
                user_type: self.user_type,
                address: self.address,
            },
            TX_GOVERN => TxPayload::Govern { action_id: self.action_id },
            TX_PROOF => TxPayload::Proof {
                netflow: self.netflow,
                start_time: self.start_time,
                end_time: self.end_time,
                ser: self.ser,
            },
            TX_CLAIM => TxPayload::Claim { reward_amount: self.reward_amount, end_time: self.end_time },
            TX_REGISTER => TxPayload::Register {
                action_id: self.action_id,
                staker_type: self.staker_type,
                params: self.node_params(),
                staker_addr: self.staker_addr,
            },
            TX_REFRESH => TxPayload::Refresh { params: self.node_params() },
            TX_WITHDRAWN => TxPayload::Withdrawn { action_id: self.action_id },
            TX_VOTE => TxPayload::Vote { action_id: self.action_id },
            TX_PROPOSAL => TxPayload::Proposal {
                action_id: self.action_id,
                start_time: self.start_time,
                end_time: self.end_time,
                action_type: self.action_type,
                key: self.key.clone(),
                new_value: self.new_value.clone(),
            },
            _ => return Err(LedgerError::InvalidType),
        };
        Ok(payload)
    }
}
