//! The authoritative money-supply state: a mapping from `(tx_id, vout)` to
//! unspent output, mutated only by whole-transaction application (spec §4.3).

use crate::coin::CoinType;
use crate::error::{InvalidTransactionReason, LedgerError};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use shared::Hash256;
use std::collections::HashMap;

/// Key into the UTXO set: `(hex(tx_id), vout)` per spec §4.3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: Hash256,
    pub vout: u32,
}

impl OutPoint {
    #[must_use]
    pub const fn new(tx_id: Hash256, vout: u32) -> Self {
        Self { tx_id, vout }
    }

    fn key(&self) -> String {
        format!("{}:{}", self.tx_id, self.vout)
    }
}

/// A single unspent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_id: Hash256,
    pub vout: u32,
    pub amount: u64,
    pub address: String,
    pub pubkey_hash: [u8; 20],
    pub coin_type: CoinType,
    pub created_ts: i64,
}

impl Utxo {
    #[must_use]
    pub const fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_id: self.tx_id,
            vout: self.vout,
        }
    }
}

/// `HashMap<(hex(tx_id), vout), Utxo>`, keyed via `OutPoint`'s `Hash` impl
/// (equivalent to the hex-string key spec §4.3 describes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtxoSet {
    utxos: HashMap<String, Utxo>,
}

impl UtxoSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
        }
    }

    pub fn add(&mut self, utxo: Utxo) {
        self.utxos.insert(utxo.outpoint().key(), utxo);
    }

    pub fn remove(&mut self, tx_id: &Hash256, vout: u32) -> Option<Utxo> {
        self.utxos.remove(&OutPoint::new(*tx_id, vout).key())
    }

    #[must_use]
    pub fn get(&self, tx_id: &Hash256, vout: u32) -> Option<&Utxo> {
        self.utxos.get(&OutPoint::new(*tx_id, vout).key())
    }

    #[must_use]
    pub fn has(&self, tx_id: &Hash256, vout: u32) -> bool {
        self.utxos.contains_key(&OutPoint::new(*tx_id, vout).key())
    }

    /// Atomically removes every UTXO an input spends and inserts every
    /// output as a new UTXO. All-or-nothing: if any input is missing, no
    /// mutation is visible and `DoubleSpend` is returned.
    pub fn update_with_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                if !self.has(&input.prev_tx_id, input.prev_vout_unsigned()) {
                    return Err(LedgerError::DoubleSpend {
                        tx_id: tx.id.to_string(),
                        vout: input.prev_vout,
                    });
                }
            }
        }

        // Every output must be well-formed before any mutation happens —
        // otherwise a bad output partway through the list would leave
        // inputs removed and earlier outputs inserted despite the error.
        for output in &tx.outputs {
            if output.amount == 0 {
                return Err(LedgerError::InvalidTransaction {
                    field: "output.amount",
                    reason: InvalidTransactionReason::NonPositiveOutput,
                });
            }
        }

        if !tx.is_coinbase() {
            for input in &tx.inputs {
                self.remove(&input.prev_tx_id, input.prev_vout_unsigned());
            }
        }

        for (vout, output) in tx.outputs.iter().enumerate() {
            self.add(Utxo {
                tx_id: tx.id,
                vout: vout as u32,
                amount: output.amount,
                address: output.address.clone(),
                pubkey_hash: output.pubkey_hash,
                coin_type: output.coin_type,
                created_ts: tx.timestamp,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn balance(&self, address: &str, coin: CoinType) -> u64 {
        self.utxos
            .values()
            .filter(|u| u.address == address && u.coin_type == coin)
            .map(|u| u.amount)
            .sum()
    }

    #[must_use]
    pub fn utxos_of(&self, address: &str, coin: CoinType) -> Vec<&Utxo> {
        self.utxos
            .values()
            .filter(|u| u.address == address && u.coin_type == coin)
            .collect()
    }

    #[must_use]
    pub fn total_supply(&self, coin: CoinType) -> u64 {
        self.utxos
            .values()
            .filter(|u| u.coin_type == coin)
            .map(|u| u.amount)
            .sum()
    }

    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_utxo(tx_id: Hash256, vout: u32, amount: u64, address: &str) -> Utxo {
        Utxo {
            tx_id,
            vout,
            amount,
            address: address.to_string(),
            pubkey_hash: [0u8; 20],
            coin_type: CoinType::Leah,
            created_ts: 0,
        }
    }

    #[test]
    fn add_get_remove_round_trip() {
        let mut set = UtxoSet::new();
        let tx_id = Hash256::sha256(b"tx1");
        set.add(sample_utxo(tx_id, 0, 100, "addrA"));

        assert!(set.has(&tx_id, 0));
        assert_eq!(set.get(&tx_id, 0).unwrap().amount, 100);

        let removed = set.remove(&tx_id, 0);
        assert!(removed.is_some());
        assert!(!set.has(&tx_id, 0));
    }

    #[test]
    fn balance_sums_matching_address_and_coin() {
        let mut set = UtxoSet::new();
        let tx_id = Hash256::sha256(b"tx1");
        set.add(sample_utxo(tx_id, 0, 100, "addrA"));
        set.add(sample_utxo(tx_id, 1, 50, "addrA"));
        set.add(sample_utxo(tx_id, 2, 999, "addrB"));

        assert_eq!(set.balance("addrA", CoinType::Leah), 150);
        assert_eq!(set.balance("addrB", CoinType::Leah), 999);
    }

    #[test]
    fn total_supply_matches_sum_of_utxos() {
        let mut set = UtxoSet::new();
        let tx_id = Hash256::sha256(b"tx1");
        set.add(sample_utxo(tx_id, 0, 100, "addrA"));
        set.add(sample_utxo(tx_id, 1, 200, "addrB"));

        assert_eq!(set.total_supply(CoinType::Leah), 300);
    }
}
