//! Versioned record codec.
//!
//! Every persisted record is laid out as:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ version (BE) │ bincode payload              │
//! │   2 bytes    │   <= MAX_RECORD_SIZE - 2     │
//! └──────────────┴──────────────────────────────┘
//! ```

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub const CODEC_VERSION: u16 = 0;

/// Upper bound for one encoded record (4 MiB).
pub const MAX_RECORD_SIZE: usize = 4 * 1024 * 1024;

const VERSION_LEN: usize = 2;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record too large: {0} bytes")]
    TooLarge(usize),

    #[error("record truncated")]
    Truncated,

    #[error("unsupported codec version {0}")]
    UnknownVersion(u16),

    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
}

pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(record)?;
    let total = VERSION_LEN + body.len();
    if total > MAX_RECORD_SIZE {
        return Err(CodecError::TooLarge(total));
    }
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&CODEC_VERSION.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a record, returning it with the version it was written with.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, u16), CodecError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(CodecError::TooLarge(bytes.len()));
    }
    if bytes.len() < VERSION_LEN {
        return Err(CodecError::Truncated);
    }
    let version = u16::from_be_bytes([bytes[0], bytes[1]]);
    if version != CODEC_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }
    let record = bincode::deserialize(&bytes[VERSION_LEN..])?;
    Ok((record, version))
}
