use thiserror::Error;

/// Errors shared by the crypto and address primitives below the ledger-core boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid key size: expected {expected}, got {got}")]
    InvalidKeySize { expected: usize, got: usize },

    #[error("malformed signature")]
    BadSignature,

    #[error("signature verification failed")]
    VerifyFailed,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encryption failure: {0}")]
    DecryptFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
