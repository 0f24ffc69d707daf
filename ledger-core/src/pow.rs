//! Proof-of-work hashing, single-threaded mining, and difficulty retarget
//! (spec §4.7). Mining is deliberately single-threaded per call here —
//! callers wanting parallelism run multiple `mine` calls concurrently —
//! a departure from the teacher's always-multithreaded `Miner`.

use crate::coin::{ChainTag, CoinType};
use crate::error::LedgerError;
use shared::Hash256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const TARGET_BLOCK_SECONDS: i64 = 120;
const RETARGET_WINDOW: usize = 2016;
const MIN_DIFFICULTY: u32 = 1;
const MAX_DIFFICULTY: u32 = 32;

fn block_type_bytes(block_type: ChainTag) -> &'static [u8] {
    match block_type {
        ChainTag::Golden => b"golden",
        ChainTag::Silver => b"silver",
    }
}

/// `hash(b) = SHA256(prev_hash ‖ block_type_bytes ‖ decimal(difficulty) ‖ decimal(nonce) ‖ decimal(timestamp))`,
/// decimal encoding canonical (no leading zeros, `"0"` for zero).
#[must_use]
pub fn block_pow_hash(prev_hash: &Hash256, block_type: ChainTag, difficulty: u32, nonce: u64, timestamp: i64) -> Hash256 {
    let mut data = Vec::new();
    data.extend_from_slice(prev_hash.as_bytes());
    data.extend_from_slice(block_type_bytes(block_type));
    data.extend_from_slice(difficulty.to_string().as_bytes());
    data.extend_from_slice(nonce.to_string().as_bytes());
    data.extend_from_slice(timestamp.to_string().as_bytes());
    Hash256::sha256(&data)
}

/// `valid_pow(b) = ∀ i<d: hash(b)[i]==0`.
#[must_use]
pub fn valid_pow(hash: &Hash256, difficulty: u32) -> bool {
    hash.meets_difficulty(difficulty)
}

/// Cooperative cancellation handle for an in-flight `mine` call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct MiningResult {
    pub hash: Hash256,
    pub nonce: u64,
    pub difficulty: u32,
    pub attempts: u64,
}

/// Mines a candidate with `difficulty = chain_difficulty × mining_difficulty(coin)`,
/// incrementing nonce from 0 until `valid_pow` holds. Fails with `NotMineable`
/// unless `coin.is_mineable()`; checks `cancel` between attempts.
pub fn mine(
    prev_hash: &Hash256,
    block_type: ChainTag,
    coin: CoinType,
    chain_difficulty: u32,
    timestamp: i64,
    cancel: &CancelToken,
) -> Result<MiningResult, LedgerError> {
    if !coin.is_mineable() {
        return Err(LedgerError::NotMineable);
    }
    // Literal spec formula: coins whose multiplier is 0 (mineable but not
    // Leah/Shiblum/Shiblon) yield difficulty 0, i.e. trivially satisfied PoW.
    // Documented inconsistency, not silently patched — see DESIGN.md.
    let difficulty = chain_difficulty.saturating_mul(coin.mining_difficulty());
    let mut nonce = 0u64;
    let mut attempts = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        let hash = block_pow_hash(prev_hash, block_type, difficulty, nonce, timestamp);
        attempts += 1;
        if valid_pow(&hash, difficulty) {
            return Ok(MiningResult {
                hash,
                nonce,
                difficulty,
                attempts,
            });
        }
        nonce += 1;
    }
}

/// Retarget over the last `min(W, len)` inter-block intervals: damped
/// adjustment toward the 2-minute target, clamped to `[1, 32]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn retarget(current_difficulty: u32, block_timestamps: &[i64]) -> u32 {
    let window = block_timestamps.len().min(RETARGET_WINDOW);
    if window < 2 {
        return current_difficulty;
    }
    let recent = &block_timestamps[block_timestamps.len() - window..];
    let span = recent.last().unwrap() - recent.first().unwrap();
    let intervals = (window - 1) as i64;
    if span <= 0 || intervals == 0 {
        return current_difficulty;
    }
    let avg = span as f64 / intervals as f64;
    let raw_adjustment = TARGET_BLOCK_SECONDS as f64 / avg;
    let damped = 1.0 + (raw_adjustment - 1.0) * 0.25;
    let new_difficulty = (current_difficulty as f64 * damped).floor();
    (new_difficulty as i64).clamp(i64::from(MIN_DIFFICULTY), i64::from(MAX_DIFFICULTY)) as u32
}
