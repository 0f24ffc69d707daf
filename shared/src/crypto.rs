//! ECDSA P-256 signing primitives for the ledger.

use crate::{Error, Hash256, Result};
use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Supported signature algorithms. Only one today; kept as an enum so the
/// wire format can grow without breaking callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    EcdsaP256,
}

/// An ECDSA P-256 public key, stored as a SEC1 compressed point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key_data: Vec<u8>,
}

/// An ECDSA P-256 private key (scalar). Zeroized on drop.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    key_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// A 64-byte `r‖s` ECDSA signature, big-endian, zero-padded (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    data: Vec<u8>,
}

impl PublicKey {
    /// Creates a public key from SEC1 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes don't decode to a valid curve point.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| Error::InvalidKeySize {
            expected: 33,
            got: bytes.len(),
        })?;
        Ok(Self { key_data: bytes })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_data
    }

    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::EcdsaP256
    }

    fn to_verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from_sec1_bytes(&self.key_data).expect("key was validated at construction")
    }
}

impl PrivateKey {
    /// Creates a private key from a raw 32-byte scalar.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid scalar.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        SigningKey::from_slice(&bytes).map_err(|_| Error::InvalidKeySize {
            expected: 32,
            got: bytes.len(),
        })?;
        Ok(Self { key_data: bytes })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_data
    }

    fn to_signing_key(&self) -> SigningKey {
        SigningKey::from_slice(&self.key_data).expect("key was validated at construction")
    }
}

impl KeyPair {
    /// Generates a new random keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if key encoding fails.
    pub fn generate() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let public_key =
            PublicKey::from_bytes(verifying_key.to_encoded_point(true).as_bytes().to_vec())?;
        let private_key = PrivateKey::from_bytes(signing_key.to_bytes().to_vec())?;
        Ok(Self {
            public_key,
            private_key,
        })
    }

    /// Rebuilds a keypair from a raw private scalar, e.g. after HD derivation.
    ///
    /// # Errors
    ///
    /// Returns an error if key encoding fails.
    pub fn from_private_key(private_key: PrivateKey) -> Result<Self> {
        let signing_key = private_key.to_signing_key();
        let verifying_key = VerifyingKey::from(&signing_key);
        let public_key =
            PublicKey::from_bytes(verifying_key.to_encoded_point(true).as_bytes().to_vec())?;
        Ok(Self {
            public_key,
            private_key,
        })
    }

    /// Signs a message using the private key.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let signing_key = self.private_key.to_signing_key();
        let sig: P256Signature = signing_key.sign(message);
        Ok(Signature {
            data: sig.to_bytes().to_vec(),
        })
    }
}

impl Signature {
    #[must_use]
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Verifies the signature against a message and public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature bytes are malformed.
    pub fn verify(&self, message: &[u8], public_key: &PublicKey) -> Result<bool> {
        let verifying_key = public_key.to_verifying_key();
        let sig = P256Signature::from_slice(&self.data).map_err(|_| Error::BadSignature)?;
        Ok(verifying_key.verify(message, &sig).is_ok())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        self.key_data.zeroize();
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Signs a transaction hash with the given keypair.
///
/// # Errors
///
/// Returns an error if signing fails.
pub fn sign_transaction_hash(tx_hash: &Hash256, keypair: &KeyPair) -> Result<Signature> {
    keypair.sign(tx_hash.as_bytes())
}

/// Verifies a signature against a transaction hash.
///
/// # Errors
///
/// Returns an error if the signature is malformed.
pub fn verify_transaction_signature(
    tx_hash: &Hash256,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<bool> {
    signature.verify(tx_hash.as_bytes(), public_key)
}

/// Creates a public key from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are invalid.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_bytes(bytes.to_vec())
}

#[must_use]
pub fn signature_from_bytes(data: Vec<u8>) -> Signature {
    Signature::from_bytes(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let keypair = KeyPair::generate().unwrap();
        let hash = Hash256::sha256(b"a transaction");

        let signature = sign_transaction_hash(&hash, &keypair).unwrap();
        assert!(verify_transaction_signature(&hash, &signature, &keypair.public_key).unwrap());
    }

    #[test]
    fn verification_fails_for_wrong_key() {
        let keypair = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let hash = Hash256::sha256(b"a transaction");

        let signature = sign_transaction_hash(&hash, &keypair).unwrap();
        assert!(!verify_transaction_signature(&hash, &signature, &other.public_key).unwrap());
    }

    #[test]
    fn private_key_reconstructs_same_public_key() {
        let keypair = KeyPair::generate().unwrap();
        let rebuilt = KeyPair::from_private_key(keypair.private_key.clone()).unwrap();
        assert_eq!(keypair.public_key, rebuilt.public_key);
    }
}
