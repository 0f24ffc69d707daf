//! Two append-only chains plus the `Node` handle that owns them, the
//! shared UTXO set, and the mempool (spec §4.6, §5). Replaces the
//! teacher's single `Blockchain` (`bond-core/src/blockchain.rs`) with a
//! `ChainState` holding both Golden and Silver sequences, generalized to
//! two parallel chains and with real signature verification filled in —
//! the teacher leaves `// TODO: Verificar assinaturas` unimplemented in
//! `validate_transaction`; this is exactly the gap closed here.

use crate::block::Block;
use crate::coin::{ChainTag, CoinType};
use crate::error::{InvalidBlockReason, InvalidTransactionReason, LedgerError};
use crate::mempool::{Mempool, MempoolEntry};
use crate::pow::{self, CancelToken};
use crate::transaction::Transaction;
use crate::utxo::UtxoSet;
use serde::{Deserialize, Serialize};
use shared::Hash256;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

/// Per-node chain state: both chains' block sequences, their independent
/// difficulties, and the append-order log used to give `revert_to_height`
/// a single global height (spec §3: "Global height = golden.len +
/// silver.len").
#[derive(Debug, Clone)]
struct ChainState {
    golden: Vec<Block>,
    silver: Vec<Block>,
    difficulty_golden: u32,
    difficulty_silver: u32,
    log: Vec<ChainTag>,
}

impl ChainState {
    fn chain_for(&self, tag: ChainTag) -> &Vec<Block> {
        match tag {
            ChainTag::Golden => &self.golden,
            ChainTag::Silver => &self.silver,
        }
    }

    fn tail(&self, tag: ChainTag) -> Option<&Block> {
        self.chain_for(tag).last()
    }

    fn difficulty_for(&self, tag: ChainTag) -> u32 {
        match tag {
            ChainTag::Golden => self.difficulty_golden,
            ChainTag::Silver => self.difficulty_silver,
        }
    }

    fn set_difficulty(&mut self, tag: ChainTag, difficulty: u32) {
        match tag {
            ChainTag::Golden => self.difficulty_golden = difficulty,
            ChainTag::Silver => self.difficulty_silver = difficulty,
        }
    }

    fn global_height(&self) -> u64 {
        self.log.len() as u64
    }

    fn push(&mut self, block: Block) {
        let tag = block.block_type;
        match tag {
            ChainTag::Golden => self.golden.push(block),
            ChainTag::Silver => self.silver.push(block),
        }
        self.log.push(tag);
        let timestamps: Vec<i64> = self.chain_for(tag).iter().map(|b| b.timestamp).collect();
        let new_difficulty = pow::retarget(self.difficulty_for(tag), &timestamps);
        self.set_difficulty(tag, new_difficulty);
    }
}

/// The self-contained, context-free checks of spec §4.6 step 7 plus the
/// chain-context checks of steps 1-3: everything `validate_block` needs
/// that does not itself require taking a lock (the caller already holds
/// the chain write lock and a UTXO snapshot — see §5's re-entrancy rule).
fn validate_block(state: &ChainState, utxo_set: &UtxoSet, block: &Block, now: i64) -> Result<(), LedgerError> {
    let prev = state.tail(block.block_type).ok_or(LedgerError::InvalidBlock {
        field: "prev_block",
        reason: InvalidBlockReason::NoPreviousBlock,
    })?;

    if block.timestamp <= prev.timestamp {
        return Err(LedgerError::InvalidBlock {
            field: "timestamp",
            reason: InvalidBlockReason::TimestampBackward,
        });
    }
    if block.timestamp > now + 60 {
        return Err(LedgerError::InvalidBlock {
            field: "timestamp",
            reason: InvalidBlockReason::TimestampFuture,
        });
    }
    if block.prev_hash != prev.hash {
        return Err(LedgerError::InvalidBlock {
            field: "prev_hash",
            reason: InvalidBlockReason::PrevHashMismatch,
        });
    }

    block.validate_basic()?;

    let mut spent_in_block = std::collections::HashSet::new();
    for tx in &block.transactions {
        if tx.is_coinbase() {
            continue;
        }
        if !tx.verify() {
            return Err(LedgerError::InvalidTransaction {
                field: "signature",
                reason: InvalidTransactionReason::BadSignature,
            });
        }
        tx.validate(utxo_set)?;
        for input in &tx.inputs {
            if !spent_in_block.insert((input.prev_tx_id, input.prev_vout)) {
                return Err(LedgerError::DoubleSpend {
                    tx_id: tx.id.to_string(),
                    vout: input.prev_vout,
                });
            }
        }
    }
    Ok(())
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Node-wide handle: one chain lock guarding both sequences (spec §5's
/// "Chain lock (per node)"), one independent UTXO lock, one mempool lock.
/// Lock-ordering rule: chain before UTXO; mempool is never held while
/// either is taken.
pub struct Node {
    chain: RwLock<ChainState>,
    utxo: RwLock<UtxoSet>,
    mempool: RwLock<Mempool>,
}

impl Node {
    /// Builds a fresh node with both chains' hard-coded genesis blocks
    /// (spec §6's "Persisted layout").
    #[must_use]
    pub fn new(mempool_max_size: usize) -> Self {
        let timestamp = now_ts();
        let golden_genesis = Block::genesis(ChainTag::Golden, timestamp);
        let silver_genesis = Block::genesis(ChainTag::Silver, timestamp);

        let mut utxo_set = UtxoSet::new();
        golden_genesis
            .apply_to_utxo_set(&mut utxo_set)
            .expect("genesis block must apply cleanly");
        silver_genesis
            .apply_to_utxo_set(&mut utxo_set)
            .expect("genesis block must apply cleanly");

        let state = ChainState {
            golden: vec![golden_genesis],
            silver: vec![silver_genesis],
            difficulty_golden: 1,
            difficulty_silver: 1,
            log: vec![ChainTag::Golden, ChainTag::Silver],
        };

        Self {
            chain: RwLock::new(state),
            utxo: RwLock::new(utxo_set),
            mempool: RwLock::new(Mempool::new(mempool_max_size)),
        }
    }

    /// Builds a node from an explicit `NodeConfig` (the CLI binary's
    /// construction path; `new` is the plain-arity constructor tests use).
    #[must_use]
    pub fn with_config(config: &NodeConfig) -> Self {
        Self::new(config.mempool_max_size)
    }

    /// Transaction submission interface: `submit(tx) → Result`.
    pub fn submit(&self, tx: Transaction) -> Result<(), LedgerError> {
        let utxo_snapshot = self.utxo.read().expect("utxo lock poisoned").snapshot();
        let mut mempool = self.mempool.write().expect("mempool lock poisoned");
        mempool.admit(tx, &utxo_snapshot, now_ts())
    }

    /// Block submission interface (peer sync): `accept_block(b) → Result`.
    /// All-or-nothing: on any validator failure, neither chain nor UTXO
    /// set is mutated.
    pub fn accept_block(&self, block: Block) -> Result<(), LedgerError> {
        let now = now_ts();
        let mut chain = self.chain.write().expect("chain lock poisoned");
        let utxo_snapshot = self.utxo.read().expect("utxo lock poisoned").snapshot();

        validate_block(&chain, &utxo_snapshot, &block, now)?;

        let mut utxo = self.utxo.write().expect("utxo lock poisoned");
        block.apply_to_utxo_set(&mut utxo)?;
        drop(utxo);

        let mut mempool = self.mempool.write().expect("mempool lock poisoned");
        for tx in &block.transactions {
            mempool.remove(&tx.id);
        }
        drop(mempool);

        chain.push(block);
        Ok(())
    }

    /// Mines a single candidate at the current chain difficulty for
    /// `block_type`; `txs` must already contain exactly one leading
    /// coinbase (spec §4.7's `mine`). Does not append — callers pass the
    /// result to `accept_block`.
    pub fn mine(&self, txs: Vec<Transaction>, block_type: ChainTag, coin: CoinType, cancel: &CancelToken) -> Result<Block, LedgerError> {
        let (prev_hash, prev_timestamp, chain_difficulty) = {
            let chain = self.chain.read().expect("chain lock poisoned");
            let prev = chain.tail(block_type).ok_or(LedgerError::ChainNotInitialized)?;
            (prev.hash, prev.timestamp, chain.difficulty_for(block_type))
        };

        // Strictly monotonic per spec §8's universal invariant, even if the
        // wall clock hasn't ticked forward since the previous block.
        let timestamp = now_ts().max(prev_timestamp + 1);
        let result = pow::mine(&prev_hash, block_type, coin, chain_difficulty, timestamp, cancel)?;

        Ok(Block {
            timestamp,
            transactions: txs,
            prev_hash,
            hash: result.hash,
            nonce: result.nonce,
            block_type,
            difficulty: result.difficulty,
        })
    }

    /// Truncates the global block sequence to `h+1`, rebuilding the UTXO
    /// set by replaying the kept blocks in append order from scratch —
    /// this is what makes `revert_to_height` followed by re-appending the
    /// originally-held blocks reproduce bit-identical state (spec §8).
    pub fn revert_to_height(&self, h: i64) -> Result<(), LedgerError> {
        let mut chain = self.chain.write().expect("chain lock poisoned");
        let current_height = chain.global_height() as i64;
        if h < 0 || h >= current_height {
            return Err(LedgerError::RevertOutOfRange);
        }
        let keep = (h + 1) as usize;
        chain.log.truncate(keep);

        let golden_keep = chain.log.iter().filter(|&&t| t == ChainTag::Golden).count();
        let silver_keep = keep - golden_keep;
        chain.golden.truncate(golden_keep);
        chain.silver.truncate(silver_keep);

        let mut rebuilt = UtxoSet::new();
        let mut gi = 0usize;
        let mut si = 0usize;
        for tag in chain.log.clone() {
            let block = match tag {
                ChainTag::Golden => {
                    let b = &chain.golden[gi];
                    gi += 1;
                    b
                }
                ChainTag::Silver => {
                    let b = &chain.silver[si];
                    si += 1;
                    b
                }
            };
            block.apply_to_utxo_set(&mut rebuilt)?;
        }

        *self.utxo.write().expect("utxo lock poisoned") = rebuilt;
        Ok(())
    }

    pub fn set_difficulty(&self, tag: ChainTag, difficulty: u32) {
        self.chain.write().expect("chain lock poisoned").set_difficulty(tag, difficulty);
    }

    // -- Query interface (spec §6) --

    #[must_use]
    pub fn balance(&self, address: &str, coin: CoinType) -> u64 {
        self.utxo.read().expect("utxo lock poisoned").balance(address, coin)
    }

    #[must_use]
    pub fn total_supply(&self, coin: CoinType) -> u64 {
        self.utxo.read().expect("utxo lock poisoned").total_supply(coin)
    }

    #[must_use]
    pub fn tx_by_id(&self, id: &Hash256) -> Option<Transaction> {
        let chain = self.chain.read().expect("chain lock poisoned");
        chain
            .golden
            .iter()
            .chain(chain.silver.iter())
            .flat_map(|b| b.transactions.iter())
            .find(|tx| &tx.id == id)
            .cloned()
    }

    #[must_use]
    pub fn block_by_hash(&self, hash: &Hash256) -> Option<Block> {
        let chain = self.chain.read().expect("chain lock poisoned");
        chain
            .golden
            .iter()
            .chain(chain.silver.iter())
            .find(|b| &b.hash == hash)
            .cloned()
    }

    #[must_use]
    pub fn txs_of(&self, address: &str) -> Vec<Transaction> {
        let chain = self.chain.read().expect("chain lock poisoned");
        chain
            .golden
            .iter()
            .chain(chain.silver.iter())
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| tx.outputs.iter().any(|o| o.address == address))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.chain.read().expect("chain lock poisoned").global_height()
    }

    #[must_use]
    pub fn latest_block(&self, tag: ChainTag) -> Option<Block> {
        self.chain.read().expect("chain lock poisoned").tail(tag).cloned()
    }

    #[must_use]
    pub fn pending_txs(&self) -> Vec<Transaction> {
        self.mempool
            .read()
            .expect("mempool lock poisoned")
            .get_pending()
            .into_iter()
            .map(|entry: &MempoolEntry| entry.tx.clone())
            .collect()
    }

    /// Runs periodic mempool eviction (spec §5's "1 min default" timer).
    pub fn cleanup_mempool(&self, max_age: i64) {
        self.mempool.write().expect("mempool lock poisoned").cleanup(max_age, now_ts());
    }

    fn chain_snapshot(&self) -> RwLockReadGuard<'_, ChainState> {
        self.chain.read().expect("chain lock poisoned")
    }

    #[must_use]
    pub fn difficulty(&self, tag: ChainTag) -> u32 {
        self.chain_snapshot().difficulty_for(tag)
    }

    #[must_use]
    pub fn balances_by_coin(&self, address: &str) -> HashMap<CoinType, u64> {
        let utxo = self.utxo.read().expect("utxo lock poisoned");
        let mut totals = HashMap::new();
        for coin in crate::coin::ALL_COIN_TYPES {
            let amount = utxo.balance(address, coin);
            if amount > 0 {
                totals.insert(coin, amount);
            }
        }
        totals
    }

    /// Admin interface: `prune(min_keep)` — FIFO-from-head pruning of both
    /// chains (spec §4.10), rebuilding the UTXO set from the kept blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuilt UTXO set cannot be reconstructed
    /// (e.g. a kept block references an input no longer in scope).
    pub fn prune(&self, min_blocks_to_keep: usize) -> Result<(), LedgerError> {
        let mut chain = self.chain.write().expect("chain lock poisoned");
        let mut utxo = self.utxo.write().expect("utxo lock poisoned");
        crate::serialize::prune(&mut chain.golden, min_blocks_to_keep, &mut utxo);
        crate::serialize::prune(&mut chain.silver, min_blocks_to_keep, &mut utxo);
        let kept: Vec<Block> = chain.golden.iter().chain(chain.silver.iter()).cloned().collect();
        *utxo = crate::serialize::optimize_utxo_set(&kept)?;
        Ok(())
    }
}

/// Network tunables a node is constructed with (spec §2's ambient
/// configuration collaborator) — mempool capacity, pruning policy, and
/// pool payout threshold. The core never reads these from disk; a
/// collaborator (the CLI binary) loads them from a `serde_json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub mempool_max_size: usize,
    pub min_blocks_to_keep: usize,
    pub pool_min_payout: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mempool_max_size: 10_000,
            min_blocks_to_keep: 2016,
            pool_min_payout: 1.0,
        }
    }
}

/// A snapshot of node-wide counters for the query/debug surface (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    pub golden_height: u64,
    pub silver_height: u64,
    pub mempool_size: usize,
    pub golden_difficulty: u32,
    pub silver_difficulty: u32,
}

impl Node {
    #[must_use]
    pub fn stats(&self) -> NodeStats {
        let chain = self.chain_snapshot();
        NodeStats {
            golden_height: chain.chain_for(ChainTag::Golden).len() as u64,
            silver_height: chain.chain_for(ChainTag::Silver).len() as u64,
            mempool_size: self.mempool.read().expect("mempool lock poisoned").len(),
            golden_difficulty: chain.difficulty_for(ChainTag::Golden),
            silver_difficulty: chain.difficulty_for(ChainTag::Silver),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_has_global_height_two_with_zero_prev_hash_genesis() {
        let node = Node::new(100);
        assert_eq!(node.height(), 2);
        let golden = node.latest_block(ChainTag::Golden).unwrap();
        let silver = node.latest_block(ChainTag::Silver).unwrap();
        assert_eq!(golden.prev_hash, Hash256::zero());
        assert_eq!(silver.prev_hash, Hash256::zero());
        assert_eq!(node.balance("golden_genesis", CoinType::Leah), 1_000_000);
        assert_eq!(node.balance("golden_genesis", CoinType::Shiblum), 500_000);
        assert_eq!(node.balance("golden_genesis", CoinType::Shiblon), 250_000);
    }

    #[test]
    fn future_timestamped_block_is_rejected() {
        let node = Node::new(100);
        let mut block = node.latest_block(ChainTag::Golden).unwrap();
        block.timestamp = now_ts() + 1000;
        block.nonce = 0;
        loop {
            let hash = block.compute_hash();
            if pow::valid_pow(&hash, block.difficulty) {
                block.hash = hash;
                break;
            }
            block.nonce += 1;
        }
        block.prev_hash = node.latest_block(ChainTag::Golden).unwrap().hash;

        let height_before = node.height();
        let err = node.accept_block(block);
        assert!(matches!(
            err,
            Err(LedgerError::InvalidBlock {
                reason: InvalidBlockReason::TimestampFuture,
                ..
            })
        ));
        assert_eq!(node.height(), height_before);
    }

    #[test]
    fn mined_block_at_difficulty_one_is_accepted() {
        let node = Node::new(100);
        let coinbase = Transaction::coinbase(
            0,
            vec![crate::transaction::TxOutput {
                amount: 1,
                coin_type: CoinType::Leah,
                pubkey_hash: [0u8; 20],
                address: "miner".to_string(),
            }],
            now_ts(),
            ChainTag::Golden,
        );
        let cancel = CancelToken::new();
        let block = node.mine(vec![coinbase], ChainTag::Golden, CoinType::Leah, &cancel).unwrap();

        assert_eq!(block.difficulty, 1);
        assert_eq!(block.hash.as_bytes()[0], 0);
        node.accept_block(block).unwrap();
        assert_eq!(node.latest_block(ChainTag::Golden).unwrap().difficulty, 1);
    }

    #[test]
    fn revert_drops_the_silver_genesis_and_rebuilds_utxo_set() {
        let node = Node::new(100);
        assert_eq!(node.height(), 2);

        node.revert_to_height(0).unwrap();
        assert_eq!(node.height(), 1);
        assert!(node.latest_block(ChainTag::Silver).is_none());
        assert_eq!(node.balance("golden_genesis", CoinType::Leah), 1_000_000);
        assert_eq!(node.balance("silver_genesis", CoinType::Senum), 0);
    }

    #[test]
    fn revert_out_of_range_is_rejected() {
        let node = Node::new(100);
        assert!(matches!(node.revert_to_height(-1), Err(LedgerError::RevertOutOfRange)));
        assert!(matches!(node.revert_to_height(5), Err(LedgerError::RevertOutOfRange)));
    }
}
