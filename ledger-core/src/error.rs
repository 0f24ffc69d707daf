//! Error taxonomy (spec §7). Validation errors are local: they are returned
//! to the caller without mutating chain, UTXO, or mempool state.

use shared::Error as CryptoError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidBlockReason {
    TimestampBackward,
    TimestampFuture,
    PrevHashMismatch,
    InvalidPow,
    EmptyTxSet,
    NoCoinbase,
    MultipleCoinbase,
    TooLarge,
    NoPreviousBlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTransactionReason {
    EmptyTx,
    BadInput,
    UnknownUtxo,
    Unauthorized,
    NonPositiveOutput,
    UnknownCoinType,
    BalanceShort,
    CrossChainForbidden,
    BadSignature,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid block ({field:?}): {reason:?}")]
    InvalidBlock {
        field: &'static str,
        reason: InvalidBlockReason,
    },

    #[error("invalid transaction field {field}: {reason:?}")]
    InvalidTransaction {
        field: &'static str,
        reason: InvalidTransactionReason,
    },

    #[error("double spend of ({tx_id}, {vout})")]
    DoubleSpend { tx_id: String, vout: i64 },

    #[error("mempool full")]
    MempoolFull,

    #[error("coin is not mineable")]
    NotMineable,

    #[error("mining cancelled")]
    Cancelled,

    #[error("insufficient components to mint special coin")]
    InsufficientComponents,

    #[error("special coin supply cap reached")]
    CapReached,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("signature verification failed")]
    VerifyFailed,

    #[error("revert height out of range")]
    RevertOutOfRange,

    #[error("chain not initialized")]
    ChainNotInitialized,

    #[error("truncated data")]
    Truncated,

    #[error("bad magic bytes")]
    BadMagic,

    #[error("size mismatch during serialization")]
    SizeMismatch,

    #[error("invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),

    #[error("keystore encryption failed")]
    KeystoreSealFailed,

    #[error("wrong password or corrupted keystore")]
    WrongPassword,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
