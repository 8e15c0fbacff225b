//! Yield pool singleton.
//!
//! Subscriber payments (minus burn) are added here; each staker-reward batch
//! distributes the undistributed part and resets it with `modify_yields(0)`.

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::db::{KvStore, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::types::TxId;

use super::internal_staged::{StagedValue, SubLedger};
use super::internal_state_layout::yields_key;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldState {
    pub total: u64,
    pub undistributed: u64,
    pub last_opr_time: u64,
    pub last_opr_tx: TxId,
}

#[derive(Debug, Clone, Default)]
pub struct YieldPool {
    inner: StagedValue<YieldState>,
}

impl YieldPool {
    pub fn new() -> Self { Self::default() }

    pub fn reload(&mut self, store: &dyn KvStore) -> LedgerResult<bool> {
        match store.get(&yields_key())? {
            Some(bytes) => {
                let (state, _) = codec::decode::<YieldState>(&bytes)?;
                self.inner.set_current(state);
                Ok(true)
            }
            None => {
                self.inner.set_current(YieldState::default());
                Ok(false)
            }
        }
    }

    pub fn state(&self) -> &YieldState {
        self.inner.get()
    }

    /// Amount available to the next reward batch.
    pub fn chain_yields(&self) -> u64 {
        self.inner.get().undistributed
    }

    /// Lifetime yield collected.
    pub fn total_yields(&self) -> u64 {
        self.inner.get().total
    }

    /// Add `amount` to the pool; `0` marks the pool as fully distributed.
    pub fn modify_yields(&mut self, amount: u64, tx_id: TxId, block_time: u64) -> LedgerResult<()> {
        let cur = self.inner.get();
        let next = YieldState {
            total: cur.total.checked_add(amount).ok_or(LedgerError::Overflow)?,
            undistributed: if amount == 0 {
                0
            } else {
                cur.undistributed.checked_add(amount).ok_or(LedgerError::Overflow)?
            },
            last_opr_time: block_time,
            last_opr_tx: tx_id,
        };
        self.inner.set(next);
        Ok(())
    }
}

impl SubLedger for YieldPool {
    fn begin(&mut self) { self.inner.begin() }
    fn rollback(&mut self) { self.inner.rollback() }
    fn release(&mut self) { self.inner.release() }

    fn stage_writes(&self, batch: &mut WriteBatch) -> Result<(), CodecError> {
        self.inner.stage_write(batch, yields_key())
    }

    fn commit(&mut self) { self.inner.commit() }
    fn abort(&mut self) { self.inner.abort() }
}
