//! Shared fixtures for the end-to-end ledger tests.
#![allow(dead_code)]

use std::sync::Arc;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;

use sama_chain::crypto::address_from_pubkey;
use sama_chain::state::NodeParams;
use sama_chain::types::SECONDS_DAY;
use sama_chain::*;

pub const MAGIC: u64 = 42;
pub const ROUTE_STAKE: u64 = 200_000_000;
pub const START: u64 = 1_668_125_288 + 30 * SECONDS_DAY;

pub fn genesis() -> Genesis {
    Genesis { magic: MAGIC, ..Genesis::default() }
}

pub fn open_memory_ledger(g: Genesis) -> Ledger {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let mut ledger = Ledger::new(g, store, 128);
    ledger.load_genesis(None).expect("genesis");
    ledger.commit().expect("commit genesis");
    ledger
}

pub fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

pub fn action(b: u8) -> ActionId {
    ActionId::from_bytes([b; 20])
}

pub fn tx_id(n: u64) -> TxId {
    let mut b = [0u8; 32];
    b[24..].copy_from_slice(&n.to_be_bytes());
    TxId::from_bytes(b)
}

pub fn submit(ledger: &mut Ledger, sender: Address, n: u64, now: u64, payload: TxPayload) -> LedgerResult<()> {
    let env = TxEnvelope::new(BaseTx { magic: MAGIC, ..BaseTx::default() }, payload);
    ledger.execute(&env, &TxContext { sender, tx_id: tx_id(n), block_time: now })
}

pub fn work_key(seed: u8) -> (String, Address) {
    let pk = SecretKey::from_slice(&[seed; 32]).expect("scalar").public_key();
    (hex::encode(pk.to_encoded_point(true).as_bytes()), address_from_pubkey(&pk))
}

pub fn node_params(work_key: &str) -> NodeParams {
    NodeParams {
        country: "DE".into(),
        local_ip: "192.168.1.10".into(),
        public_ip: "88.1.2.3".into(),
        min_port: 30000,
        max_port: 30100,
        check_port: 30101,
        work_key: work_key.into(),
    }
}

/// Register, confirm by root vote and stake `staker` for `role` at `now`.
/// Returns the node's work address.
pub fn stake_node(ledger: &mut Ledger, staker: Address, role: StakerRole, key_seed: u8, id: u8, now: u64) -> Address {
    let (key, work) = work_key(key_seed);
    let root = ledger.params().root_address;
    let amount = match role {
        StakerRole::Service => ledger.params().ser_stake,
        _ => ledger.params().route_stake,
    };
    let base = u64::from(id) * 100;

    submit(ledger, staker, base + 1, now, TxPayload::Register {
        action_id: action(id),
        staker_type: role.as_u64(),
        params: node_params(&key),
        staker_addr: staker,
    })
    .expect("register");
    submit(ledger, root, base + 2, now, TxPayload::Vote { action_id: action(id) }).expect("root vote");
    submit(ledger, staker, base + 3, now, TxPayload::Stake {
        staker_type: role.as_u64(),
        stake_amount: amount,
        staker_addr: staker,
    })
    .expect("stake");
    work
}
