//! crypto helpers for sama-chain: keccak hashing + work-key address derivation
use anyhow::{anyhow, Result};
use hex::encode as hex_encode;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use sha3::{Digest, Keccak256};

use crate::types::Address;

/// compute keccak256 of bytes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let sum = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&sum);
    out
}

/// `0x`-prefixed keccak256 hex, used to pin airdrop files in genesis
pub fn keccak256_hex(data: &[u8]) -> String {
    format!("0x{}", hex_encode(keccak256(data)))
}

/// Derive the account address of a secp256k1 public key.
/// Address = last 20 bytes of keccak256(uncompressed point without the 0x04 tag).
pub fn address_from_pubkey(pk: &PublicKey) -> Address {
    let point = pk.to_encoded_point(false);
    let bytes = point.as_bytes();
    let digest = keccak256(&bytes[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address::from_bytes(out)
}

/// Parse a hex encoded SEC1 public key (compressed or uncompressed) and
/// derive the work address a node signs with.
pub fn work_address_from_key(work_key: &str) -> Result<Address> {
    let s = work_key.strip_prefix("0x").unwrap_or(work_key);
    let raw = hex::decode(s).map_err(|e| anyhow!("work key err {}", e))?;
    let pk = PublicKey::from_sec1_bytes(&raw)
        .map_err(|e| anyhow!("unmarshal pubkey err {}", e))?;
    Ok(address_from_pubkey(&pk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::SecretKey;

    fn test_key(seed: u8) -> SecretKey {
        SecretKey::from_slice(&[seed; 32]).expect("valid scalar")
    }

    #[test]
    fn keccak_known_vector() {
        // keccak256("") is the well known empty digest
        assert_eq!(
            hex_encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn compressed_and_uncompressed_keys_agree() {
        let pk = test_key(7).public_key();
        let full = hex_encode(pk.to_encoded_point(false).as_bytes());
        let short = hex_encode(pk.to_encoded_point(true).as_bytes());
        let a = work_address_from_key(&full).expect("full");
        let b = work_address_from_key(&short).expect("short");
        assert_eq!(a, b);
        assert_eq!(a, address_from_pubkey(&pk));
    }

    #[test]
    fn bad_work_keys_are_rejected() {
        assert!(work_address_from_key("zz").is_err());
        assert!(work_address_from_key("04deadbeef").is_err());
    }

    #[test]
    fn known_secret_key_address() {
        // secret key 0x...01 maps to the well known generator address
        let mut sk = [0u8; 32];
        sk[31] = 1;
        let pk = SecretKey::from_slice(&sk).expect("sk").public_key();
        assert_eq!(
            address_from_pubkey(&pk).to_hex(),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }
}
