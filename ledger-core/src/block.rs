//! Block structure, per-chain genesis construction, and the
//! self-contained structural checks of spec §4.6 (steps 4, 5, 6, 8; the
//! chain-context checks — steps 1, 2, 3, 7 — live in `chain.rs`).

use crate::coin::{CoinType, ChainTag};
use crate::error::{InvalidBlockReason, LedgerError};
use crate::pow;
use crate::transaction::{Transaction, TxOutput};
use crate::utxo::UtxoSet;
use serde::{Deserialize, Serialize};
use shared::Hash256;

/// Canonical maximum block size (spec §4.6 step 8).
pub const MAX_BLOCK_SIZE: usize = 1_048_576; // 1 MiB

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub prev_hash: Hash256,
    pub hash: Hash256,
    pub nonce: u64,
    pub block_type: ChainTag,
    pub difficulty: u32,
}

impl Block {
    /// Recomputes the PoW content hash from the header fields (spec §4.7).
    #[must_use]
    pub fn compute_hash(&self) -> Hash256 {
        pow::block_pow_hash(&self.prev_hash, self.block_type, self.difficulty, self.nonce, self.timestamp)
    }

    /// Builds and mines the fixed genesis block for one chain, minting the
    /// chain-specific initial supplies into the `"golden_genesis"` /
    /// `"silver_genesis"` address (spec §6).
    #[must_use]
    pub fn genesis(block_type: ChainTag, timestamp: i64) -> Self {
        let address = match block_type {
            ChainTag::Golden => "golden_genesis",
            ChainTag::Silver => "silver_genesis",
        };
        let outputs: Vec<TxOutput> = match block_type {
            ChainTag::Golden => vec![
                genesis_output(1_000_000, CoinType::Leah, address),
                genesis_output(500_000, CoinType::Shiblum, address),
                genesis_output(250_000, CoinType::Shiblon, address),
            ],
            ChainTag::Silver => vec![
                genesis_output(1_000_000, CoinType::Senum, address),
                genesis_output(500_000, CoinType::Amnor, address),
                genesis_output(250_000, CoinType::Ezrom, address),
            ],
        };
        let coinbase = Transaction::coinbase(0, outputs, timestamp, block_type);

        let mut block = Self {
            timestamp,
            transactions: vec![coinbase],
            prev_hash: Hash256::zero(),
            hash: Hash256::zero(),
            nonce: 0,
            block_type,
            difficulty: 1,
        };
        loop {
            let hash = block.compute_hash();
            if pow::valid_pow(&hash, block.difficulty) {
                block.hash = hash;
                break;
            }
            block.nonce += 1;
        }
        block
    }

    #[must_use]
    pub fn is_coinbase_first(&self) -> bool {
        self.transactions.first().is_some_and(Transaction::is_coinbase)
    }

    /// Structural checks independent of chain context, in spec §4.6's
    /// order: valid PoW (step 4), non-empty tx set (step 5), exactly one
    /// leading coinbase (step 6), size cap (step 8). First failure returns.
    pub fn validate_basic(&self) -> Result<(), LedgerError> {
        if self.compute_hash() != self.hash || !pow::valid_pow(&self.hash, self.difficulty) {
            return Err(LedgerError::InvalidBlock {
                field: "hash",
                reason: InvalidBlockReason::InvalidPow,
            });
        }
        if self.transactions.is_empty() {
            return Err(LedgerError::InvalidBlock {
                field: "transactions",
                reason: InvalidBlockReason::EmptyTxSet,
            });
        }
        if !self.is_coinbase_first() {
            return Err(LedgerError::InvalidBlock {
                field: "transactions[0]",
                reason: InvalidBlockReason::NoCoinbase,
            });
        }
        for tx in self.transactions.iter().skip(1) {
            if tx.is_coinbase() {
                return Err(LedgerError::InvalidBlock {
                    field: "transactions",
                    reason: InvalidBlockReason::MultipleCoinbase,
                });
            }
        }
        if self.exceeds_max_size() {
            return Err(LedgerError::InvalidBlock {
                field: "size",
                reason: InvalidBlockReason::TooLarge,
            });
        }
        Ok(())
    }

    /// Applies every transaction's UTXO mutation. Not all-or-nothing on its
    /// own — callers (`chain.rs::add_block`) are responsible for validating
    /// before calling this so that failure here never happens on an
    /// accepted block.
    pub fn apply_to_utxo_set(&self, utxo_set: &mut UtxoSet) -> Result<(), LedgerError> {
        for tx in &self.transactions {
            utxo_set.update_with_transaction(tx)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        crate::serialize::encode_block(self).len()
    }

    #[must_use]
    pub fn exceeds_max_size(&self) -> bool {
        self.size() > MAX_BLOCK_SIZE
    }
}

fn genesis_output(amount: u64, coin_type: CoinType, address: &str) -> TxOutput {
    TxOutput {
        amount,
        coin_type,
        pubkey_hash: [0u8; 20],
        address: address.to_string(),
    }
}

/// Builds the merkle root over transaction ids via repeated SHA-256
/// pairing; an odd trailing node is paired with itself.
#[must_use]
pub fn calculate_merkle_root(transactions: &[Transaction]) -> Hash256 {
    if transactions.is_empty() {
        return Hash256::zero();
    }
    let mut hashes: Vec<Hash256> = transactions.iter().map(|tx| tx.id).collect();
    if hashes.len() == 1 {
        return hashes[0];
    }
    while hashes.len() > 1 {
        let mut next_level = Vec::new();
        for chunk in hashes.chunks(2) {
            let mut data = Vec::new();
            data.extend_from_slice(chunk[0].as_bytes());
            if chunk.len() == 2 {
                data.extend_from_slice(chunk[1].as_bytes());
            } else {
                data.extend_from_slice(chunk[0].as_bytes());
            }
            next_level.push(Hash256::sha256(&data));
        }
        hashes = next_level;
    }
    hashes[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_zero_prev_hash_and_valid_pow() {
        let genesis = Block::genesis(ChainTag::Golden, 0);
        assert_eq!(genesis.prev_hash, Hash256::zero());
        assert!(pow::valid_pow(&genesis.hash, genesis.difficulty));
        assert!(genesis.validate_basic().is_ok());
    }

    #[test]
    fn genesis_mints_expected_golden_supply() {
        let genesis = Block::genesis(ChainTag::Golden, 0);
        let coinbase = &genesis.transactions[0];
        let leah: u64 = coinbase
            .outputs
            .iter()
            .filter(|o| o.coin_type == CoinType::Leah)
            .map(|o| o.amount)
            .sum();
        assert_eq!(leah, 1_000_000);
    }

    #[test]
    fn merkle_root_differs_with_content() {
        let g1 = Block::genesis(ChainTag::Golden, 0);
        let g2 = Block::genesis(ChainTag::Silver, 0);
        let root1 = calculate_merkle_root(&g1.transactions);
        let root2 = calculate_merkle_root(&g2.transactions);
        assert_ne!(root1, root2);
    }

    #[test]
    fn block_with_two_coinbases_fails_validation() {
        let mut block = Block::genesis(ChainTag::Golden, 0);
        let second_coinbase = block.transactions[0].clone();
        block.transactions.push(second_coinbase);
        assert!(block.validate_basic().is_err());
    }
}
