//! Bounded priority mempool: admission against the UTXO set, priority
//! ordering, and age-based eviction (spec §4.5). Grounded on
//! `Ponknot-Knotcoin/src/net/mempool.rs`'s `HashMap`-keyed pool and
//! size-limited eviction shape, adapted from its fee-per-byte/RBF model to
//! the spec's plain `amount + fee*α − age*β` priority (no RBF here).

use crate::coin::CoinType;
use crate::error::LedgerError;
use crate::transaction::Transaction;
use crate::utxo::UtxoSet;
use serde::{Deserialize, Serialize};
use shared::Hash256;
use std::collections::HashMap;

const PRIORITY_ALPHA: f64 = 1.0;
const PRIORITY_BETA: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub added_at: i64,
    pub priority: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mempool {
    max_size: usize,
    entries: HashMap<Hash256, MempoolEntry>,
}

fn priority_of(tx: &Transaction, utxo_set: &UtxoSet, now: i64) -> f64 {
    let amount_leah_equivalent: f64 = tx
        .outputs
        .iter()
        .map(|o| o.coin_type.convert_to_leah(o.amount as f64))
        .sum();
    let fee = tx.fee(utxo_set).ok().flatten().unwrap_or(0) as f64;
    let age_seconds = (now - tx.timestamp).max(0) as f64;
    amount_leah_equivalent + fee * PRIORITY_ALPHA - age_seconds * PRIORITY_BETA
}

impl Mempool {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: HashMap::new(),
        }
    }

    /// Validates `tx` against `utxo_set` and verifies its signatures before
    /// admission; rejects with `MempoolFull` if at capacity.
    pub fn admit(&mut self, tx: Transaction, utxo_set: &UtxoSet, now: i64) -> Result<(), LedgerError> {
        if self.entries.len() >= self.max_size {
            return Err(LedgerError::MempoolFull);
        }
        tx.validate(utxo_set)?;
        if !tx.verify() {
            return Err(LedgerError::VerifyFailed);
        }
        let priority = priority_of(&tx, utxo_set, now);
        self.entries.insert(
            tx.id,
            MempoolEntry {
                tx,
                added_at: now,
                priority,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, tx_id: &Hash256) -> Option<MempoolEntry> {
        self.entries.remove(tx_id)
    }

    /// Entries sorted by priority descending, tie-broken by `added_at`
    /// ascending.
    #[must_use]
    pub fn get_pending(&self) -> Vec<&MempoolEntry> {
        let mut pending: Vec<&MempoolEntry> = self.entries.values().collect();
        pending.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.added_at.cmp(&b.added_at))
        });
        pending
    }

    /// Evicts entries older than `max_age` seconds relative to `now`.
    pub fn cleanup(&mut self, max_age: i64, now: i64) {
        self.entries.retain(|_, entry| now - entry.added_at <= max_age);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, tx_id: &Hash256) -> bool {
        self.entries.contains_key(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::ChainTag;
    use crate::transaction::TxOutput;

    fn coinbase_like(amount: u64, coin: CoinType, timestamp: i64) -> Transaction {
        Transaction::coinbase(
            0,
            vec![TxOutput {
                amount,
                coin_type: coin,
                pubkey_hash: [0u8; 20],
                address: "a".to_string(),
            }],
            timestamp,
            ChainTag::Golden,
        )
    }

    #[test]
    fn admission_rejects_when_full() {
        let mut pool = Mempool::new(1);
        let utxo = UtxoSet::new();
        pool.admit(coinbase_like(10, CoinType::Leah, 0), &utxo, 0).unwrap();
        let err = pool.admit(coinbase_like(10, CoinType::Leah, 1), &utxo, 1);
        assert!(matches!(err, Err(LedgerError::MempoolFull)));
    }

    #[test]
    fn pending_sorted_by_priority_descending() {
        let mut pool = Mempool::new(10);
        let utxo = UtxoSet::new();
        pool.admit(coinbase_like(5, CoinType::Leah, 0), &utxo, 0).unwrap();
        pool.admit(coinbase_like(100, CoinType::Leah, 0), &utxo, 0).unwrap();
        let pending = pool.get_pending();
        assert!(pending[0].priority >= pending[1].priority);
    }

    #[test]
    fn cleanup_evicts_old_entries() {
        let mut pool = Mempool::new(10);
        let utxo = UtxoSet::new();
        pool.admit(coinbase_like(5, CoinType::Leah, 0), &utxo, 0).unwrap();
        pool.cleanup(10, 1000);
        assert!(pool.is_empty());
    }
}
