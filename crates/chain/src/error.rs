//! Ledger error type.
//!
//! Validation failures carry the exact message surfaced to the submitter.
//! Store and codec failures are wrapped unchanged and are fatal for the
//! current operation.

use thiserror::Error;

use crate::codec::CodecError;
use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    // ════════════════════════════════════════════════════════════════════════════
    // ENVELOPE / GENERIC
    // ════════════════════════════════════════════════════════════════════════════
    #[error("invalid magic")]
    InvalidMagic,

    #[error("invalid block rate")]
    InvalidBlockRate,

    #[error("genesis: {0}")]
    Genesis(String),

    #[error("invalid price")]
    InvalidPrice,

    #[error("invalid type")]
    InvalidType,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("non-actionable")]
    NonActionable,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("amount overflow")]
    Overflow,

    #[error("value empty")]
    ValueEmpty,

    #[error("value too big")]
    ValueTooBig,

    // ════════════════════════════════════════════════════════════════════════════
    // STAKING / REWARDS
    // ════════════════════════════════════════════════════════════════════════════
    #[error("invalid staker type")]
    StakerType,

    #[error("invalid stake amount")]
    StakeAmount,

    #[error("end time too early")]
    EndTimeTooEarly,

    #[error("end time too late")]
    EndTimeTooLate,

    #[error("have already been staker")]
    AlreadyStaker,

    #[error("no be confirmed")]
    NotConfirmed,

    #[error("staker not found")]
    StakerNotFound,

    #[error("sender is not the staker address")]
    StakerSender,

    #[error("stake time must > {0} days")]
    StakeTimeTooShort(u64),

    #[error("reward amount is err")]
    RewardMismatch,

    #[error("sender must staker or foundation")]
    NotClaimer,

    #[error("time interval need > 7 days")]
    ClaimInterval,

    #[error("end time err")]
    ClaimEndTime,

    #[error("address or claimer type err")]
    ClaimerType,

    #[error("endTime err {end} {stake}")]
    RewardBeforeStake { end: u64, stake: u64 },

    // ════════════════════════════════════════════════════════════════════════════
    // SUBSCRIBERS
    // ════════════════════════════════════════════════════════════════════════════
    #[error("start time > endtime")]
    StartAfterEnd,

    #[error("time > 31 days")]
    WindowTooLong,

    #[error("time < 28 days")]
    WindowTooShort,

    #[error("start time err")]
    StartTime,

    #[error("user type err")]
    UserType,

    #[error("pay amount check fail")]
    PayAmount,

    #[error("user already exists")]
    UserExists,

    // ════════════════════════════════════════════════════════════════════════════
    // PROOF / NODE DETAILS
    // ════════════════════════════════════════════════════════════════════════════
    #[error("sender must route or ser node")]
    NotWorkNode,

    #[error("netflow too small")]
    NetflowTooSmall,

    #[error("netflow too big")]
    NetflowTooBig,

    #[error("endtime err")]
    ProofEndTime,

    #[error("interval too small")]
    IntervalTooSmall,

    #[error("interval too big")]
    IntervalTooBig,

    #[error("pow type err")]
    PowRole,

    #[error("{0}")]
    WorkKey(String),

    #[error("staker type err")]
    DetailRole,

    #[error("is repeated")]
    Repeated,

    #[error("detail not found")]
    DetailNotFound,

    // ════════════════════════════════════════════════════════════════════════════
    // GOVERNANCE
    // ════════════════════════════════════════════════════════════════════════════
    #[error("action ID exist")]
    ActionExists,

    #[error("not found action")]
    ActionNotFound,

    #[error("action is overdue")]
    ActionOverdue,

    #[error("need < 14 days")]
    GraceExpired,

    #[error("action not be confirmed")]
    ActionNotConfirmed,

    #[error("action type err")]
    ActionType,

    #[error("action type not exist")]
    UnknownActionType,

    #[error("{0}")]
    ProposalRepeat(&'static str),

    #[error("user type exist")]
    UserTypeExists,

    #[error("user type not exist")]
    UserTypeMissing,

    #[error("equal")]
    FeeUnchanged,

    #[error("equal CurParam")]
    ParamUnchanged,

    #[error("err key {0}")]
    ParamKey(String),

    #[error("failed to parse newValue {0}")]
    ParamValue(String),

    #[error("percentage err")]
    Percentage,

    #[error("sender is not route node")]
    NotRoute,

    #[error("sender do not have permission")]
    NoPermission,

    #[error("voter is exist")]
    VoterExists,

    // ════════════════════════════════════════════════════════════════════════════
    // INFRASTRUCTURE
    // ════════════════════════════════════════════════════════════════════════════
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl LedgerError {
    /// True for failures that come from the store or codec rather than from
    /// validating the transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::Store(_) | LedgerError::Codec(_))
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
