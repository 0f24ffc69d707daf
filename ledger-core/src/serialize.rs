//! Canonical little-endian block/transaction wire codec, pruning, and the
//! UTXO LRU cache (spec §4.10). No teacher analogue — `bond-core` only
//! ever serializes via `serde_json` for hashing — so the byte layout is
//! grounded directly on spec §4.10's field list, written from scratch.

use crate::block::Block;
use crate::coin::{ChainTag, CoinType};
use crate::error::LedgerError;
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utxo::UtxoSet;
use shared::Hash256;
use std::collections::HashMap;

fn coin_name(coin: CoinType) -> &'static str {
    match coin {
        CoinType::Leah => "Leah",
        CoinType::Shiblum => "Shiblum",
        CoinType::Shiblon => "Shiblon",
        CoinType::Senine => "Senine",
        CoinType::Seon => "Seon",
        CoinType::Shum => "Shum",
        CoinType::Limnah => "Limnah",
        CoinType::Antion => "Antion",
        CoinType::Senum => "Senum",
        CoinType::Amnor => "Amnor",
        CoinType::Ezrom => "Ezrom",
        CoinType::Onti => "Onti",
        CoinType::Ephraim => "Ephraim",
        CoinType::Manasseh => "Manasseh",
        CoinType::Joseph => "Joseph",
    }
}

fn parse_coin(name: &str) -> Result<CoinType, LedgerError> {
    match name {
        "Leah" => Ok(CoinType::Leah),
        "Shiblum" => Ok(CoinType::Shiblum),
        "Shiblon" => Ok(CoinType::Shiblon),
        "Senine" => Ok(CoinType::Senine),
        "Seon" => Ok(CoinType::Seon),
        "Shum" => Ok(CoinType::Shum),
        "Limnah" => Ok(CoinType::Limnah),
        "Antion" => Ok(CoinType::Antion),
        "Senum" => Ok(CoinType::Senum),
        "Amnor" => Ok(CoinType::Amnor),
        "Ezrom" => Ok(CoinType::Ezrom),
        "Onti" => Ok(CoinType::Onti),
        "Ephraim" => Ok(CoinType::Ephraim),
        "Manasseh" => Ok(CoinType::Manasseh),
        "Joseph" => Ok(CoinType::Joseph),
        _ => Err(LedgerError::SizeMismatch),
    }
}

fn pad_block_type(tag: ChainTag) -> [u8; 8] {
    let name = match tag {
        ChainTag::Golden => b"golden".as_slice(),
        ChainTag::Silver => b"silver".as_slice(),
    };
    let mut padded = [0u8; 8];
    padded[..name.len()].copy_from_slice(name);
    padded
}

fn parse_block_type(bytes: &[u8]) -> Result<ChainTag, LedgerError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    match &bytes[..end] {
        b"golden" => Ok(ChainTag::Golden),
        b"silver" => Ok(ChainTag::Silver),
        _ => Err(LedgerError::BadMagic),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], LedgerError> {
        if self.pos + n > self.data.len() {
            return Err(LedgerError::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn i64(&mut self) -> Result<i64, LedgerError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, LedgerError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, LedgerError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64, LedgerError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn hash256(&mut self) -> Result<Hash256, LedgerError> {
        Ok(Hash256::from_bytes(self.take(32)?.try_into().unwrap()))
    }

    fn len_prefixed(&mut self) -> Result<Vec<u8>, LedgerError> {
        let len = self.i32()?;
        let len = usize::try_from(len).map_err(|_| LedgerError::SizeMismatch)?;
        Ok(self.take(len)?.to_vec())
    }

    fn len_prefixed_string(&mut self) -> Result<String, LedgerError> {
        let bytes = self.len_prefixed()?;
        String::from_utf8(bytes).map_err(|_| LedgerError::SizeMismatch)
    }
}

fn put_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Canonical transaction wire encoding (spec §4.10).
#[must_use]
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(tx.id.as_bytes());
    buf.extend_from_slice(&tx.timestamp.to_le_bytes());
    buf.extend_from_slice(&pad_block_type(tx.block_type));

    buf.extend_from_slice(&(tx.inputs.len() as i32).to_le_bytes());
    for input in &tx.inputs {
        buf.extend_from_slice(input.prev_tx_id.as_bytes());
        buf.extend_from_slice(&(input.prev_vout as i32).to_le_bytes());
        #[allow(clippy::cast_precision_loss)]
        buf.extend_from_slice(&(input.amount as f64).to_le_bytes());
        put_len_prefixed(&mut buf, &input.signature);
        put_len_prefixed(&mut buf, &input.public_key);
        put_len_prefixed(&mut buf, input.address.as_bytes());
    }

    buf.extend_from_slice(&(tx.outputs.len() as i32).to_le_bytes());
    for output in &tx.outputs {
        #[allow(clippy::cast_precision_loss)]
        buf.extend_from_slice(&(output.amount as f64).to_le_bytes());
        put_len_prefixed(&mut buf, coin_name(output.coin_type).as_bytes());
        put_len_prefixed(&mut buf, &output.pubkey_hash);
        put_len_prefixed(&mut buf, output.address.as_bytes());
    }
    buf
}

/// Decodes a transaction from its canonical wire encoding.
pub fn decode_transaction(data: &[u8]) -> Result<Transaction, LedgerError> {
    let mut r = Reader::new(data);
    let tx_id = r.hash256()?;
    let timestamp = r.i64()?;
    let block_type = parse_block_type(r.take(8)?)?;

    let input_count = r.i32()?;
    let input_count = usize::try_from(input_count).map_err(|_| LedgerError::SizeMismatch)?;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let prev_tx_id = r.hash256()?;
        let prev_vout = i64::from(r.i32()?);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let amount = r.f64()? as u64;
        let signature = r.len_prefixed()?;
        let public_key = r.len_prefixed()?;
        let address = r.len_prefixed_string()?;
        inputs.push(TxInput {
            prev_tx_id,
            prev_vout,
            amount,
            signature,
            public_key,
            address,
        });
    }

    let output_count = r.i32()?;
    let output_count = usize::try_from(output_count).map_err(|_| LedgerError::SizeMismatch)?;
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let amount = r.f64()? as u64;
        let coin_type = parse_coin(&r.len_prefixed_string()?)?;
        let pkh_bytes = r.len_prefixed()?;
        let pubkey_hash: [u8; 20] = pkh_bytes.try_into().map_err(|_| LedgerError::SizeMismatch)?;
        let address = r.len_prefixed_string()?;
        outputs.push(TxOutput {
            amount,
            coin_type,
            pubkey_hash,
            address,
        });
    }

    Ok(Transaction {
        id: tx_id,
        inputs,
        outputs,
        timestamp,
        block_type,
    })
}

/// Canonical block wire encoding (spec §4.10).
#[must_use]
pub fn encode_block(block: &Block) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&block.timestamp.to_le_bytes());
    buf.extend_from_slice(&block.nonce.to_le_bytes());
    buf.extend_from_slice(&(block.difficulty as i32).to_le_bytes());
    buf.extend_from_slice(block.hash.as_bytes());
    buf.extend_from_slice(block.prev_hash.as_bytes());
    buf.extend_from_slice(&pad_block_type(block.block_type));
    buf.extend_from_slice(&(block.transactions.len() as i32).to_le_bytes());
    for tx in &block.transactions {
        let tx_bytes = encode_transaction(tx);
        buf.extend_from_slice(&(tx_bytes.len() as i32).to_le_bytes());
        buf.extend_from_slice(&tx_bytes);
    }
    buf
}

/// Decodes a block from its canonical wire encoding.
pub fn decode_block(data: &[u8]) -> Result<Block, LedgerError> {
    let mut r = Reader::new(data);
    let timestamp = r.i64()?;
    let nonce = r.u64()?;
    let difficulty = u32::try_from(r.i32()?).map_err(|_| LedgerError::SizeMismatch)?;
    let hash = r.hash256()?;
    let prev_hash = r.hash256()?;
    let block_type = parse_block_type(r.take(8)?)?;

    let tx_count = r.i32()?;
    let tx_count = usize::try_from(tx_count).map_err(|_| LedgerError::SizeMismatch)?;
    let mut transactions = Vec::with_capacity(tx_count);
    for _ in 0..tx_count {
        let tx_size = r.i32()?;
        let tx_size = usize::try_from(tx_size).map_err(|_| LedgerError::SizeMismatch)?;
        let tx_bytes = r.take(tx_size)?;
        transactions.push(decode_transaction(tx_bytes)?);
    }

    Ok(Block {
        timestamp,
        transactions,
        prev_hash,
        hash,
        nonce,
        block_type,
        difficulty,
    })
}

/// Removes blocks beyond `min_blocks_to_keep` FIFO from the head, never the
/// genesis, and removes any UTXO that a pruned block's transactions
/// reference as an input.
pub fn prune(blocks: &mut Vec<Block>, min_blocks_to_keep: usize, utxo_set: &mut UtxoSet) {
    while blocks.len() > min_blocks_to_keep.max(1) {
        let pruned = blocks.remove(1); // index 0 is genesis, never pruned
        for tx in &pruned.transactions {
            for input in &tx.inputs {
                if !tx.is_coinbase() {
                    utxo_set.remove(&input.prev_tx_id, input.prev_vout_unsigned());
                }
            }
        }
    }
}

/// Rebuilds the UTXO set from only the kept blocks, omitting any UTXO that
/// any kept block consumes.
pub fn optimize_utxo_set(kept_blocks: &[Block]) -> Result<UtxoSet, LedgerError> {
    let mut set = UtxoSet::new();
    for block in kept_blocks {
        block.apply_to_utxo_set(&mut set)?;
    }
    Ok(set)
}

/// LRU cache over UTXO keys, evicting the entry with the oldest
/// `created_ts` when over capacity.
pub struct UtxoCache {
    capacity: usize,
    entries: HashMap<(Hash256, u32), i64>,
}

impl UtxoCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, tx_id: Hash256, vout: u32, created_ts: i64) {
        self.entries.insert((tx_id, vout), created_ts);
        while self.entries.len() > self.capacity {
            if let Some(&oldest_key) = self
                .entries
                .iter()
                .min_by_key(|(_, &ts)| ts)
                .map(|(k, _)| k)
            {
                self.entries.remove(&oldest_key);
            } else {
                break;
            }
        }
    }

    #[must_use]
    pub fn contains(&self, tx_id: &Hash256, vout: u32) -> bool {
        self.entries.contains_key(&(*tx_id, vout))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
