use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use hex::{encode as hex_encode, decode as hex_decode};

// ════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ════════════════════════════════════════════════════════════════════════════
// Reward years are 364 days (52 full weeks).

pub const SECONDS_MINUTE: u64 = 60;
pub const SECONDS_DAY: u64 = 24 * 60 * 60;
pub const SECONDS_7_DAY: u64 = 7 * SECONDS_DAY;
pub const SECONDS_MONTH: u64 = 30 * SECONDS_DAY;
pub const SECONDS_YEAR: u64 = 364 * SECONDS_DAY;

/// Address is 20 bytes (last 20 bytes of keccak256(pubkey))
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(b: [u8; 20]) -> Self { Address(b) }
    pub fn as_bytes(&self) -> &[u8; 20] { &self.0 }
    pub fn is_zero(&self) -> bool { self.0 == [0u8; 20] }
    pub fn to_hex(&self) -> String { hex_encode(self.0) }
    /// `0x`-prefixed lowercase hex, the form used as a governance key.
    pub fn to_prefixed_hex(&self) -> String { format!("0x{}", self.to_hex()) }
    pub fn from_hex(s: &str) -> Result<Self, anyhow::Error> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex_decode(s)?;
        if bytes.len() != 20 { anyhow::bail!("invalid address length: {}", bytes.len()); }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Address(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_prefixed_hex())
    }
}
impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&self.to_hex()).finish()
    }
}
impl FromStr for Address {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

/* --- serde serialize/deserialize for Address as hex string --- */
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_prefixed_hex())
    }
}
impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Address, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Governance action identifier, 20 opaque bytes chosen by the proposer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ActionId(pub [u8; 20]);

impl ActionId {
    pub fn from_bytes(b: [u8; 20]) -> Self { ActionId(b) }
    pub fn as_bytes(&self) -> &[u8; 20] { &self.0 }
    pub fn to_hex(&self) -> String { hex_encode(self.0) }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionId").field(&self.to_hex()).finish()
    }
}
impl FromStr for ActionId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let v = hex_decode(s)?;
        if v.len() != 20 { anyhow::bail!("invalid action id length: {}", v.len()); }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&v);
        Ok(ActionId(arr))
    }
}

impl Serialize for ActionId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for ActionId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<ActionId, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        ActionId::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Transaction id: 32 byte content hash assigned by the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    pub fn from_bytes(b: [u8; 32]) -> Self { TxId(b) }
    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }
    pub fn to_hex(&self) -> String { hex_encode(self.0) }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TxId").field(&self.to_hex()).finish()
    }
}
impl FromStr for TxId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let v = hex_decode(s)?;
        if v.len() != 32 { anyhow::bail!("invalid tx id length: {}", v.len()); }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&v);
        Ok(TxId(arr))
    }
}

/* serde impls for TxId as hex string */
impl Serialize for TxId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<TxId, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        TxId::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// STAKER ROLE
// ════════════════════════════════════════════════════════════════════════════

/// Role of a staked infrastructure node.
///
/// Wire value `0` is reserved for the foundation in claim contexts and is
/// never a valid role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum StakerRole {
    Route = 1,
    Service = 2,
    Validator = 3,
}

impl StakerRole {
    pub const ALL: [StakerRole; 3] = [StakerRole::Route, StakerRole::Service, StakerRole::Validator];

    pub fn as_u8(self) -> u8 { self as u8 }
    pub fn as_u64(self) -> u64 { self as u64 }

    pub fn from_u64(v: u64) -> Option<Self> {
        match v {
            1 => Some(StakerRole::Route),
            2 => Some(StakerRole::Service),
            3 => Some(StakerRole::Validator),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StakerRole::Route => "route",
            StakerRole::Service => "ser",
            StakerRole::Validator => "validator",
        }
    }
}

impl fmt::Display for StakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
