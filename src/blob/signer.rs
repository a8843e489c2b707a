// src/blob/signer.rs

//! Sui signer address derivation
//!
//! A Sui ed25519 address is `blake2b-256(0x00 || public_key)`, hex encoded
//! with a `0x` prefix. The flag byte `0x00` selects the ed25519 scheme.

use crate::error::{Error, Result};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::SigningKey;

type Blake2b256 = Blake2b<U32>;

const ED25519_FLAG: u8 = 0x00;

/// Derive the Sui address for a hex-encoded 32-byte ed25519 seed
pub fn address_from_seed(seed_hex: &str) -> Result<String> {
    let seed_hex = seed_hex.trim().trim_start_matches("0x");
    let bytes = hex::decode(seed_hex)
        .map_err(|e| Error::Config(format!("SUI_SIGNER_SEED is not valid hex: {}", e)))?;
    let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
        Error::Config(format!("SUI_SIGNER_SEED must be 32 bytes, got {}", b.len()))
    })?;

    let key = SigningKey::from_bytes(&seed);
    Ok(address_from_public_key(key.verifying_key().as_bytes()))
}

/// Sui address of an ed25519 public key
pub fn address_from_public_key(public_key: &[u8; 32]) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Validate a configured `0x`-prefixed 32-byte address
pub fn normalize_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if body.len() != 64 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Config(format!(
            "'{}' is not a 32-byte hex Sui address",
            address
        )));
    }
    Ok(format!("0x{}", body.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_shape() {
        let address = address_from_seed(&"07".repeat(32)).unwrap();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 66);
        assert_eq!(address, address_from_seed(&format!("0x{}", "07".repeat(32))).unwrap());
    }

    #[test]
    fn test_known_seed_address() {
        // RFC 8032 test 1 key pair
        let seed = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
        let public_key: [u8; 32] = hex::decode("d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a")
            .unwrap()
            .try_into()
            .unwrap();
        let expected = "0x304af458e90e97c841685b8cbbc59b909f3e2cf150df590ada4c81452c29737d";

        assert_eq!(address_from_public_key(&public_key), expected);
        assert_eq!(address_from_seed(seed).unwrap(), expected);
    }

    #[test]
    fn test_distinct_seeds_give_distinct_addresses() {
        let a = address_from_seed(&"01".repeat(32)).unwrap();
        let b = address_from_seed(&"02".repeat(32)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_bad_seed_is_config_error() {
        assert!(matches!(address_from_seed("zz"), Err(Error::Config(_))));
        assert!(matches!(address_from_seed("abcd"), Err(Error::Config(_))));
    }

    #[test]
    fn test_normalize_address() {
        let upper = format!("0x{}", "AB".repeat(32));
        assert_eq!(normalize_address(&upper).unwrap(), format!("0x{}", "ab".repeat(32)));
        assert!(normalize_address("0x1234").is_err());
    }
}
