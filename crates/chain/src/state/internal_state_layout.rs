//! Store key layout for every sub-ledger.
//!
//! Keys are `prefix, DELIM, [subtype, DELIM,] natural key`. Key formats are
//! part of the on-disk format and must not change without a migration.
//!
//! | Prefix | Sub-ledger | Suffix |
//! |--------|------------|--------|
//! | 0x01 | stakers | role, addr |
//! | 0x02 | rewards | 0 + addr (local) / 1 (global) |
//! | 0x03 | proof meters | role, addr |
//! | 0x04 | yield pool | - |
//! | 0x05 | subscribers | addr |
//! | 0x06 | fee tiers | id (u64 BE) |
//! | 0x07 | node details | work addr |
//! | 0x08 | actions | action id |
//! | 0x09 | system params | - |
//! | 0x0a | balances | addr |
//! | 0x0b | stake balances | addr |
//! | 0x0c | values | keccak256(value) |

use crate::types::{ActionId, Address, StakerRole};

pub const DELIM: u8 = b'/';

pub const PREFIX_STAKER: u8 = 0x01;
pub const PREFIX_REWARD: u8 = 0x02;
pub const PREFIX_POW: u8 = 0x03;
pub const PREFIX_YIELDS: u8 = 0x04;
pub const PREFIX_USER: u8 = 0x05;
pub const PREFIX_USER_TYPE: u8 = 0x06;
pub const PREFIX_DETAIL: u8 = 0x07;
pub const PREFIX_ACTION: u8 = 0x08;
pub const PREFIX_SYS_PARAMS: u8 = 0x09;
pub const PREFIX_BALANCE: u8 = 0x0a;
pub const PREFIX_STAKE_BALANCE: u8 = 0x0b;
pub const PREFIX_VALUE: u8 = 0x0c;

pub const REWARD_LOCAL: u8 = 0;
pub const REWARD_GLOBAL: u8 = 1;

fn keyed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(prefix.len() + suffix.len());
    k.extend_from_slice(prefix);
    k.extend_from_slice(suffix);
    k
}

// ------------------------ stakers ------------------------

pub fn staker_prefix(role: StakerRole) -> Vec<u8> {
    vec![PREFIX_STAKER, DELIM, role.as_u8(), DELIM]
}

pub fn staker_key(role: StakerRole, addr: &Address) -> Vec<u8> {
    keyed(&staker_prefix(role), addr.as_bytes())
}

// ------------------------ rewards ------------------------

pub fn reward_prefix() -> Vec<u8> {
    vec![PREFIX_REWARD, DELIM, REWARD_LOCAL, DELIM]
}

pub fn reward_key(addr: &Address) -> Vec<u8> {
    keyed(&reward_prefix(), addr.as_bytes())
}

pub fn reward_global_key() -> Vec<u8> {
    vec![PREFIX_REWARD, DELIM, REWARD_GLOBAL, DELIM]
}

// ------------------------ proof meters ------------------------

pub fn pow_prefix(role: StakerRole) -> Vec<u8> {
    vec![PREFIX_POW, DELIM, role.as_u8(), DELIM]
}

pub fn pow_key(role: StakerRole, addr: &Address) -> Vec<u8> {
    keyed(&pow_prefix(role), addr.as_bytes())
}

// ------------------------ singletons ------------------------

pub fn yields_key() -> Vec<u8> {
    vec![PREFIX_YIELDS, DELIM]
}

pub fn sys_params_key() -> Vec<u8> {
    vec![PREFIX_SYS_PARAMS, DELIM]
}

// ------------------------ subscribers / fee tiers ------------------------

pub fn user_prefix() -> Vec<u8> {
    vec![PREFIX_USER, DELIM]
}

pub fn user_key(addr: &Address) -> Vec<u8> {
    keyed(&user_prefix(), addr.as_bytes())
}

pub fn user_type_prefix() -> Vec<u8> {
    vec![PREFIX_USER_TYPE, DELIM]
}

pub fn user_type_key(id: u64) -> Vec<u8> {
    keyed(&user_type_prefix(), &id.to_be_bytes())
}

// ------------------------ node details / actions ------------------------

pub fn detail_prefix() -> Vec<u8> {
    vec![PREFIX_DETAIL, DELIM]
}

pub fn detail_key(work_addr: &Address) -> Vec<u8> {
    keyed(&detail_prefix(), work_addr.as_bytes())
}

pub fn action_prefix() -> Vec<u8> {
    vec![PREFIX_ACTION, DELIM]
}

pub fn action_key(id: &ActionId) -> Vec<u8> {
    keyed(&action_prefix(), id.as_bytes())
}

// ------------------------ accounts ------------------------

pub fn balance_key(addr: &Address) -> Vec<u8> {
    keyed(&[PREFIX_BALANCE, DELIM], addr.as_bytes())
}

pub fn stake_balance_key(addr: &Address) -> Vec<u8> {
    keyed(&[PREFIX_STAKE_BALANCE, DELIM], addr.as_bytes())
}

pub fn value_key(hash: &[u8; 32]) -> Vec<u8> {
    keyed(&[PREFIX_VALUE, DELIM], hash)
}
