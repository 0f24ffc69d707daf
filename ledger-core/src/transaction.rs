//! Inputs, outputs, coinbase, trimmed-copy hashing, signing/verification,
//! and multi-coin balance validation (spec §4.4).

use crate::coin::{CoinType, ChainTag};
use crate::error::{InvalidTransactionReason, LedgerError};
use crate::utxo::UtxoSet;
use serde::{Deserialize, Serialize};
use shared::{self, Hash256, KeyPair};
use std::collections::HashMap;

/// Sentinel previous-output-index identifying a coinbase input (spec §3).
pub const COINBASE_VOUT: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx_id: Hash256,
    pub prev_vout: i64,
    pub amount: u64,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub address: String,
}

impl TxInput {
    #[must_use]
    pub fn coinbase(block_height: u64) -> Self {
        Self {
            prev_tx_id: Hash256::zero(),
            prev_vout: COINBASE_VOUT,
            amount: block_height,
            signature: Vec::new(),
            public_key: Vec::new(),
            address: String::new(),
        }
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.prev_tx_id == Hash256::zero() && self.prev_vout == COINBASE_VOUT
    }

    /// `prev_vout` as an output index. Only meaningful for non-coinbase
    /// inputs; callers must check `is_coinbase()` first.
    #[must_use]
    pub fn prev_vout_unsigned(&self) -> u32 {
        self.prev_vout.max(0) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub coin_type: CoinType,
    pub pubkey_hash: [u8; 20],
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub timestamp: i64,
    pub block_type: ChainTag,
}

fn encode_outputs(buf: &mut Vec<u8>, outputs: &[TxOutput]) {
    buf.extend_from_slice(&(outputs.len() as u32).to_le_bytes());
    for out in outputs {
        buf.extend_from_slice(&out.amount.to_le_bytes());
        buf.extend_from_slice(&(out.coin_type as u8).to_le_bytes());
        buf.extend_from_slice(&out.pubkey_hash);
        buf.extend_from_slice(&(out.address.len() as u32).to_le_bytes());
        buf.extend_from_slice(out.address.as_bytes());
    }
}

fn encode_input_header(buf: &mut Vec<u8>, input: &TxInput) {
    buf.extend_from_slice(input.prev_tx_id.as_bytes());
    buf.extend_from_slice(&input.prev_vout.to_le_bytes());
    buf.extend_from_slice(&input.amount.to_le_bytes());
}

impl Transaction {
    /// Builds a new transaction: trims signatures, computes the id, stamps
    /// the timestamp and the chain tag.
    #[must_use]
    pub fn new(
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        timestamp: i64,
        block_type: ChainTag,
    ) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
            timestamp,
            block_type,
        };
        for input in &mut tx.inputs {
            input.signature.clear();
            input.public_key.clear();
        }
        tx.id = tx.compute_id();
        tx
    }

    #[must_use]
    pub fn coinbase(block_height: u64, outputs: Vec<TxOutput>, timestamp: i64, block_type: ChainTag) -> Self {
        Self::new(vec![TxInput::coinbase(block_height)], outputs, timestamp, block_type)
    }

    /// The fully trimmed canonical byte form used as the id pre-image:
    /// every input's signature and public key are cleared.
    fn trimmed_copy_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.push(self.block_type as u8);
        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            encode_input_header(&mut buf, input);
            // signature and public_key are always empty in the trimmed copy
            buf.extend_from_slice(&0u32.to_le_bytes());
        }
        encode_outputs(&mut buf, &self.outputs);
        buf
    }

    /// The per-input signing pre-image: identical to the trimmed copy
    /// except the input at `active_index` carries `active_pubkey` in its
    /// public-key slot (spec §4.4's `sign`/`verify`).
    fn signing_preimage(&self, active_index: usize, active_pubkey: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.push(self.block_type as u8);
        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for (i, input) in self.inputs.iter().enumerate() {
            encode_input_header(&mut buf, input);
            let pk: &[u8] = if i == active_index { active_pubkey } else { &[] };
            buf.extend_from_slice(&(pk.len() as u32).to_le_bytes());
            buf.extend_from_slice(pk);
        }
        encode_outputs(&mut buf, &self.outputs);
        buf
    }

    #[must_use]
    pub fn compute_id(&self) -> Hash256 {
        Hash256::sha256(&self.trimmed_copy_bytes())
    }

    /// Signs every non-coinbase input with `keypair`, storing the resulting
    /// signature and public key back on the original (untrimmed) input.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), LedgerError> {
        let pubkey_bytes = keypair.public_key.as_bytes().to_vec();
        for i in 0..self.inputs.len() {
            if self.inputs[i].is_coinbase() {
                continue;
            }
            let preimage = self.signing_preimage(i, &pubkey_bytes);
            let hash = Hash256::sha256(&preimage);
            let signature = shared::sign_transaction_hash(&hash, keypair)?;
            self.inputs[i].signature = signature.as_bytes().to_vec();
            self.inputs[i].public_key = pubkey_bytes.clone();
        }
        Ok(())
    }

    /// Recomputes each input's signing hash with its own stored public key
    /// and verifies the stored signature against it.
    #[must_use]
    pub fn verify(&self) -> bool {
        for (i, input) in self.inputs.iter().enumerate() {
            if input.is_coinbase() {
                continue;
            }
            if input.public_key.is_empty() || input.signature.is_empty() {
                return false;
            }
            let Ok(public_key) = shared::public_key_from_bytes(&input.public_key) else {
                return false;
            };
            let preimage = self.signing_preimage(i, &input.public_key);
            let hash = Hash256::sha256(&preimage);
            let signature = shared::signature_from_bytes(input.signature.clone());
            match shared::verify_transaction_signature(&hash, &signature, &public_key) {
                Ok(true) => continue,
                _ => return false,
            }
        }
        true
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    fn total_input_by_coin(&self, utxo_set: &UtxoSet) -> Result<HashMap<CoinType, u64>, LedgerError> {
        let mut totals = HashMap::new();
        for input in &self.inputs {
            if input.is_coinbase() {
                continue;
            }
            let utxo = utxo_set
                .get(&input.prev_tx_id, input.prev_vout_unsigned())
                .ok_or(LedgerError::InvalidTransaction {
                    field: "input",
                    reason: InvalidTransactionReason::UnknownUtxo,
                })?;
            *totals.entry(utxo.coin_type).or_insert(0u64) += utxo.amount;
        }
        Ok(totals)
    }

    #[must_use]
    pub fn total_output_by_coin(&self) -> HashMap<CoinType, u64> {
        let mut totals = HashMap::new();
        for output in &self.outputs {
            *totals.entry(output.coin_type).or_insert(0u64) += output.amount;
        }
        totals
    }

    /// Leah-equivalent fee: `total_input - total_output`, only meaningful
    /// when every coin in play is directly comparable (single coin type on
    /// both sides). Returns `None` for mixed-coin transactions.
    pub fn fee(&self, utxo_set: &UtxoSet) -> Result<Option<i64>, LedgerError> {
        let inputs = self.total_input_by_coin(utxo_set)?;
        let outputs = self.total_output_by_coin();
        if inputs.len() != 1 || outputs.keys().any(|c| !inputs.contains_key(c)) {
            return Ok(None);
        }
        let (coin, in_amount) = inputs.into_iter().next().expect("checked len == 1");
        let out_amount = outputs.get(&coin).copied().unwrap_or(0);
        Ok(Some(in_amount as i64 - out_amount as i64))
    }

    /// Full validation against the UTXO set (spec §4.4, non-coinbase rules).
    pub fn validate(&self, utxo_set: &UtxoSet) -> Result<(), LedgerError> {
        if self.is_coinbase() {
            if self.outputs.is_empty() {
                return Err(LedgerError::InvalidTransaction {
                    field: "outputs",
                    reason: InvalidTransactionReason::EmptyTx,
                });
            }
            return Ok(());
        }

        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(LedgerError::InvalidTransaction {
                field: "inputs/outputs",
                reason: InvalidTransactionReason::EmptyTx,
            });
        }

        for input in &self.inputs {
            let utxo = utxo_set
                .get(&input.prev_tx_id, input.prev_vout_unsigned())
                .ok_or(LedgerError::InvalidTransaction {
                    field: "input",
                    reason: InvalidTransactionReason::UnknownUtxo,
                })?;
            let expected_hash = shared::pubkey_hash(&input.public_key);
            if expected_hash != utxo.pubkey_hash {
                return Err(LedgerError::InvalidTransaction {
                    field: "input.public_key",
                    reason: InvalidTransactionReason::Unauthorized,
                });
            }
        }

        for output in &self.outputs {
            if output.amount == 0 {
                return Err(LedgerError::InvalidTransaction {
                    field: "output.amount",
                    reason: InvalidTransactionReason::NonPositiveOutput,
                });
            }
            if output.pubkey_hash == [0u8; 20] {
                return Err(LedgerError::InvalidTransaction {
                    field: "output.pubkey_hash",
                    reason: InvalidTransactionReason::BadInput,
                });
            }
        }

        // Rule 5: cross-chain outputs must be in the transferable set.
        for output in &self.outputs {
            let native = output.coin_type.chain_of() == Some(self.block_type);
            if !native && !output.coin_type.can_cross_chain() {
                return Err(LedgerError::InvalidTransaction {
                    field: "output.coin_type",
                    reason: InvalidTransactionReason::CrossChainForbidden,
                });
            }
        }

        // Rule 4: per-coin-type balance, with the limited implicit
        // conversions the spec permits.
        let mut input_totals = self.total_input_by_coin(utxo_set)?;
        let output_totals = self.total_output_by_coin();

        // Fixed iteration order (spec §4.4 rule 4): deficit coverage for one
        // coin consumes from the same pools another coin's coverage may
        // draw on, so iterating a `HashMap` directly would make acceptance
        // depend on the per-process hash seed. `ALL_COIN_TYPES` is a fixed
        // order, so the same inputs/outputs always validate the same way.
        for coin in crate::coin::ALL_COIN_TYPES {
            let Some(&needed) = output_totals.get(&coin) else {
                continue;
            };
            let available = input_totals.get(&coin).copied().unwrap_or(0);
            if available >= needed {
                *input_totals.get_mut(&coin).unwrap() -= needed;
                continue;
            }
            let deficit = needed - available;
            if let Some(avail) = input_totals.get_mut(&coin) {
                *avail = 0;
            }

            let covered = match coin {
                CoinType::Shiblum => cover_deficit(&mut input_totals, CoinType::Leah, deficit, 2),
                CoinType::Shiblon => cover_deficit(&mut input_totals, CoinType::Shiblum, deficit, 2),
                CoinType::Senum => cover_deficit_fraction(&mut input_totals, CoinType::Shiblon, deficit),
                _ => false,
            };
            if !covered {
                return Err(LedgerError::InvalidTransaction {
                    field: "balance",
                    reason: InvalidTransactionReason::BalanceShort,
                });
            }
        }

        Ok(())
    }
}

/// Covers a deficit of `deficit` units of the target coin using
/// `multiplier` times as many units of `source`, per spec §4.4 rule 4.
fn cover_deficit(
    totals: &mut HashMap<CoinType, u64>,
    source: CoinType,
    deficit: u64,
    multiplier: u64,
) -> bool {
    let required_source = deficit * multiplier;
    let available = totals.get(&source).copied().unwrap_or(0);
    if available < required_source {
        return false;
    }
    *totals.get_mut(&source).unwrap() -= required_source;
    true
}

/// Spec §4.4's literal Senum rule: `shiblonAmount ≥ deficit / 2` — i.e. the
/// deficit is covered by half as many Shiblon as the Senum shortfall.
/// Spec §9 documents this as inconsistent with the Leah-equivalent lattice
/// and preserves it deliberately; see DESIGN.md.
fn cover_deficit_fraction(totals: &mut HashMap<CoinType, u64>, source: CoinType, deficit: u64) -> bool {
    let required_source = deficit.div_ceil(2);
    let available = totals.get(&source).copied().unwrap_or(0);
    if available < required_source {
        return false;
    }
    *totals.get_mut(&source).unwrap() -= required_source;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::Utxo;
    use shared::KeyPair;

    fn output(amount: u64, coin: CoinType, address: &str) -> TxOutput {
        TxOutput {
            amount,
            coin_type: coin,
            pubkey_hash: [1u8; 20],
            address: address.to_string(),
        }
    }

    #[test]
    fn coinbase_is_recognized() {
        let tx = Transaction::coinbase(1, vec![output(100, CoinType::Leah, "a")], 0, ChainTag::Golden);
        assert!(tx.is_coinbase());
    }

    #[test]
    fn id_matches_trimmed_copy_hash() {
        let tx = Transaction::coinbase(1, vec![output(100, CoinType::Leah, "a")], 0, ChainTag::Golden);
        assert_eq!(tx.id, tx.compute_id());
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let keypair = KeyPair::generate().unwrap();
        let pubkey_hash = shared::pubkey_hash(keypair.public_key.as_bytes());
        let address = shared::derive_address(&keypair.public_key);

        let mut utxo_set = UtxoSet::new();
        let funding_tx_id = Hash256::sha256(b"funding");
        utxo_set.add(Utxo {
            tx_id: funding_tx_id,
            vout: 0,
            amount: 10,
            address: address.clone(),
            pubkey_hash,
            coin_type: CoinType::Leah,
            created_ts: 0,
        });

        let input = TxInput {
            prev_tx_id: funding_tx_id,
            prev_vout: 0,
            amount: 10,
            signature: Vec::new(),
            public_key: Vec::new(),
            address: address.clone(),
        };
        let mut tx = Transaction::new(
            vec![input],
            vec![output(10, CoinType::Leah, "someone_else")],
            0,
            ChainTag::Golden,
        );
        tx.sign(&keypair).unwrap();
        assert!(tx.verify());
        assert!(tx.validate(&utxo_set).is_ok());
    }

    #[test]
    fn conversion_deficit_covered_by_smaller_coin() {
        let keypair = KeyPair::generate().unwrap();
        let pubkey_hash = shared::pubkey_hash(keypair.public_key.as_bytes());
        let address = shared::derive_address(&keypair.public_key);

        let mut utxo_set = UtxoSet::new();
        let funding_tx_id = Hash256::sha256(b"funding");
        utxo_set.add(Utxo {
            tx_id: funding_tx_id,
            vout: 0,
            amount: 10,
            address: address.clone(),
            pubkey_hash,
            coin_type: CoinType::Leah,
            created_ts: 0,
        });

        let input = TxInput {
            prev_tx_id: funding_tx_id,
            prev_vout: 0,
            amount: 10,
            signature: Vec::new(),
            public_key: Vec::new(),
            address: address.clone(),
        };
        let mut tx = Transaction::new(
            vec![input],
            vec![output(3, CoinType::Shiblum, "b"), output(4, CoinType::Leah, &address)],
            0,
            ChainTag::Golden,
        );
        tx.sign(&keypair).unwrap();
        assert!(tx.validate(&utxo_set).is_ok());
    }

    #[test]
    fn conversion_deficit_rejected_when_insufficient() {
        let keypair = KeyPair::generate().unwrap();
        let pubkey_hash = shared::pubkey_hash(keypair.public_key.as_bytes());
        let address = shared::derive_address(&keypair.public_key);

        let mut utxo_set = UtxoSet::new();
        let funding_tx_id = Hash256::sha256(b"funding");
        utxo_set.add(Utxo {
            tx_id: funding_tx_id,
            vout: 0,
            amount: 10,
            address: address.clone(),
            pubkey_hash,
            coin_type: CoinType::Leah,
            created_ts: 0,
        });

        let input = TxInput {
            prev_tx_id: funding_tx_id,
            prev_vout: 0,
            amount: 10,
            signature: Vec::new(),
            public_key: Vec::new(),
            address: address.clone(),
        };
        let mut tx = Transaction::new(
            vec![input],
            vec![output(6, CoinType::Shiblum, "b")],
            0,
            ChainTag::Golden,
        );
        tx.sign(&keypair).unwrap();
        assert!(tx.validate(&utxo_set).is_err());
    }
}
