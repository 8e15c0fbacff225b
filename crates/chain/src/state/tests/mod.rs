//! Cross-module ledger tests: facade lifecycle and multi-transaction
//! workflows driven through `Ledger::execute`.


use std::sync::Arc;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;

use crate::crypto::address_from_pubkey;
use crate::db::MemoryStore;
use crate::error::LedgerResult;
use crate::genesis::Genesis;
use crate::state::{Ledger, NodeParams, TxContext};
use crate::tx::{BaseTx, TxEnvelope, TxPayload};
use crate::types::{ActionId, Address, TxId, SECONDS_DAY};

pub(super) const MAGIC: u64 = 1;

/// Ten days after the default chain creation time.
pub(super) const START: u64 = 1_668_125_288 + 10 * SECONDS_DAY;

pub(super) fn genesis() -> Genesis {
    Genesis { magic: MAGIC, ..Genesis::default() }
}

pub(super) fn ledger_with(g: Genesis) -> (Ledger, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(g, store.clone(), 64);
    (ledger, store)
}

pub(super) fn ledger() -> (Ledger, Arc<MemoryStore>) {
    let (mut l, store) = ledger_with(genesis());
    l.load_genesis(None).expect("genesis");
    l.commit().expect("commit genesis");
    (l, store)
}

pub(super) fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

pub(super) fn action(b: u8) -> ActionId {
    ActionId::from_bytes([b; 20])
}

pub(super) fn tx_id(n: u64) -> TxId {
    let mut b = [0u8; 32];
    b[..8].copy_from_slice(&n.to_be_bytes());
    TxId::from_bytes(b)
}

pub(super) fn root(l: &Ledger) -> Address {
    l.params().root_address
}

pub(super) fn exec(l: &mut Ledger, sender: Address, n: u64, now: u64, payload: TxPayload) -> LedgerResult<()> {
    exec_priced(l, sender, n, now, 0, payload)
}

pub(super) fn exec_priced(
    l: &mut Ledger,
    sender: Address,
    n: u64,
    now: u64,
    price: u64,
    payload: TxPayload,
) -> LedgerResult<()> {
    let env = TxEnvelope::new(BaseTx { magic: MAGIC, price, ..BaseTx::default() }, payload);
    let ctx = TxContext { sender, tx_id: tx_id(n), block_time: now };
    l.execute(&env, &ctx)
}

/// Hex SEC1 work key for a deterministic secret, and its work address.
pub(super) fn work_key(seed: u8) -> (String, Address) {
    let pk = SecretKey::from_slice(&[seed; 32]).expect("scalar").public_key();
    (hex::encode(pk.to_encoded_point(false).as_bytes()), address_from_pubkey(&pk))
}

pub(super) fn node_params(key: &str, public_ip: &str) -> NodeParams {
    NodeParams {
        country: "SG".into(),
        local_ip: "10.0.0.2".into(),
        public_ip: public_ip.into(),
        min_port: 20000,
        max_port: 20100,
        check_port: 20101,
        work_key: key.into(),
    }
}
