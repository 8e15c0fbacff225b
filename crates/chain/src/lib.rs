//! # Sama Chain Ledger Library
//!
//! Ledger state machine and transaction engine for the Sama subnet.
//!
//! ## Module Overview
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `types` | Address, ActionId, TxId, StakerRole, time constants |
//! | `crypto` | keccak256, work key → work address |
//! | `codec` | Versioned binary codec for persisted records |
//! | `db` | `KvStore` contract, `MemoryStore`, `LmdbStore`, `WriteBatch` |
//! | `config` | Node config (TOML) |
//! | `genesis` | Genesis parameters and allocations |
//! | `error` | `LedgerError` |
//! | `tx` | `TxEnvelope`, `TxPayload`, fee units, `Activity`, `TxInput` |
//! | `state` | `Ledger` facade and the sub-ledgers |
//! | `cli` | `sama-ledger` harness |
//!
//! ## Execution model
//!
//! ```text
//!   host ──► Ledger::execute(env, ctx)   (one tx, journaled)
//!        ──► Ledger::execute(env, ctx)
//!        ──► Ledger::commit()            (one atomic WriteBatch per block)
//!            or Ledger::abort()          (drop everything pending)
//! ```
//!
//! "Now" is always the block time carried by [`state::TxContext`]; the
//! library never reads the wall clock.

pub mod types;
pub mod crypto;
pub mod codec;
pub mod db;
pub mod config;
pub mod genesis;
pub mod error;
pub mod tx;
pub mod state;
pub mod cli;

pub use db::{KvStore, LmdbStore, MemoryStore, WriteBatch};
pub use error::{LedgerError, LedgerResult};
pub use genesis::Genesis;
pub use state::{Ledger, TxContext};
pub use tx::{Activity, BaseTx, TxEnvelope, TxInput, TxPayload};
pub use types::{ActionId, Address, StakerRole, TxId};
