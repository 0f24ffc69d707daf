//! Base16 address encoding over a RIPEMD-160(SHA-256(pubkey)) digest (spec §4.1).

use crate::crypto::PublicKey;
use crate::{Error, Result};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

const VERSION_BYTE: u8 = 0x00;
const CHECKSUM_LEN: usize = 4;

/// `RIPEMD160(SHA256(pubkey))`, the 20-byte pubkey hash embedded in UTXOs
/// and checked against spending signatures.
#[must_use]
pub fn pubkey_hash(pubkey: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(pubkey);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    out
}

/// Encodes a pubkey hash into the human-readable checksummed address:
/// `hex(0x00 ‖ pubkey_hash ‖ checksum)` where `checksum` is the first 4
/// bytes of `SHA256(SHA256(0x00 ‖ pubkey_hash))`.
#[must_use]
pub fn encode_address(hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(1 + 20);
    payload.push(VERSION_BYTE);
    payload.extend_from_slice(hash);

    let checksum_full = Sha256::digest(Sha256::digest(&payload));
    payload.extend_from_slice(&checksum_full[..CHECKSUM_LEN]);

    hex::encode(payload)
}

/// Derives the checksummed address string directly from a public key.
#[must_use]
pub fn derive_address(pubkey: &PublicKey) -> String {
    encode_address(&pubkey_hash(pubkey.as_bytes()))
}

/// Recomputes the checksum of an address string and compares it.
pub fn validate_address(address: &str) -> Result<()> {
    let bytes = hex::decode(address)
        .map_err(|e| Error::InvalidAddress(format!("not valid hex: {e}")))?;
    if bytes.len() != 1 + 20 + CHECKSUM_LEN {
        return Err(Error::InvalidAddress(format!(
            "expected {} bytes, got {}",
            1 + 20 + CHECKSUM_LEN,
            bytes.len()
        )));
    }
    let (payload, checksum) = bytes.split_at(1 + 20);
    let expected_checksum = Sha256::digest(Sha256::digest(payload));
    if &expected_checksum[..CHECKSUM_LEN] != checksum {
        return Err(Error::InvalidAddress("checksum mismatch".to_string()));
    }
    Ok(())
}

/// Extracts the raw 20-byte pubkey hash from a validated address string.
pub fn pubkey_hash_from_address(address: &str) -> Result<[u8; 20]> {
    validate_address(address)?;
    let bytes = hex::decode(address).expect("validated above");
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes[1..21]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn address_round_trip_validates() {
        let keypair = KeyPair::generate().unwrap();
        let address = derive_address(&keypair.public_key);
        assert!(validate_address(&address).is_ok());
    }

    #[test]
    fn tampered_address_fails_checksum() {
        let keypair = KeyPair::generate().unwrap();
        let mut address = derive_address(&keypair.public_key);
        address.replace_range(2..4, "ff");
        // Either the hex still decodes and the checksum now mismatches, or
        // it happens to match (astronomically unlikely) — assert the
        // common case explicitly handled by our replacement.
        assert!(validate_address(&address).is_err() || address == derive_address(&keypair.public_key));
    }

    #[test]
    fn pubkey_hash_recovers_from_address() {
        let keypair = KeyPair::generate().unwrap();
        let expected = pubkey_hash(keypair.public_key.as_bytes());
        let address = encode_address(&expected);
        let recovered = pubkey_hash_from_address(&address).unwrap();
        assert_eq!(expected, recovered);
    }
}
