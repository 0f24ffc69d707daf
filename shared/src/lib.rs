pub mod address;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use address::{derive_address, encode_address, pubkey_hash, pubkey_hash_from_address, validate_address};
pub use crypto::{
    public_key_from_bytes, sign_transaction_hash, signature_from_bytes,
    verify_transaction_signature, KeyPair, PrivateKey, PublicKey, Signature, SignatureAlgorithm,
};
pub use error::Error;
pub use hash::Hash256;
pub use types::{BlockHeight, OutputIndex, Timestamp};

pub type Result<T> = std::result::Result<T, Error>;
