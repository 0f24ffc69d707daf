pub mod batch;
pub mod block;
pub mod chain;
pub mod coin;
pub mod error;
pub mod mempool;
pub mod pool;
pub mod pow;
pub mod serialize;
pub mod transaction;
pub mod utxo;
pub mod wallet;

// Primary re-exports
pub use batch::{Batch, DEFAULT_BATCH_SIZE};
pub use block::{Block, MAX_BLOCK_SIZE};
pub use chain::{Node, NodeConfig, NodeStats};
pub use coin::{ChainTag, CoinType};
pub use error::{InvalidBlockReason, InvalidTransactionReason, LedgerError};
pub use mempool::{Mempool, MempoolEntry};
pub use pool::{MinerRecord, MiningPool};
pub use pow::{mine, retarget, CancelToken, MiningResult};
pub use transaction::{Transaction, TxInput, TxOutput};
pub use utxo::{OutPoint, Utxo, UtxoSet};
pub use wallet::{Keystore, Kdf, Wallet, WalletKey};

// Re-exports of shared crypto/hash types
pub use shared::{Hash256, Result as SharedResult};
