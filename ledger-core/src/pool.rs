//! Mining pool share accounting (spec §4.8): no teacher or pack analogue,
//! grounded directly on the spec and written in the single-write-mutex
//! style the teacher uses for `Miner`'s shared state (`bond-core/src/mining.rs`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinerRecord {
    pub address: String,
    pub hashrate: f64,
    pub accumulated_shares: f64,
    pub pending_payout: f64,
    pub last_share_ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningPool {
    miners: HashMap<String, MinerRecord>,
    total_hashrate: f64,
    pool_share: f64,
    min_payout: f64,
}

impl MiningPool {
    #[must_use]
    pub fn new(pool_share: f64, min_payout: f64) -> Self {
        Self {
            miners: HashMap::new(),
            total_hashrate: 0.0,
            pool_share,
            min_payout,
        }
    }

    /// Overwrites `hashrate`, increments `shares`, bumps `total_hashrate`.
    pub fn update(&mut self, miner_id: &str, address: &str, hashrate: f64, shares: f64, now: i64) {
        let record = self.miners.entry(miner_id.to_string()).or_default();
        self.total_hashrate += hashrate - record.hashrate;
        record.address = address.to_string();
        record.hashrate = hashrate;
        record.accumulated_shares += shares;
        record.last_share_ts = now;
    }

    /// `(miner.shares / total_hashrate) × block_reward × pool_share`, added
    /// to `pending_payout`; zeros `miner.shares` on success.
    #[must_use]
    pub fn compute_reward(&mut self, miner_id: &str, block_reward: f64) -> Option<f64> {
        if self.total_hashrate <= 0.0 {
            return None;
        }
        let record = self.miners.get_mut(miner_id)?;
        let reward = (record.accumulated_shares / self.total_hashrate) * block_reward * self.pool_share;
        record.pending_payout += reward;
        record.accumulated_shares = 0.0;
        Some(reward)
    }

    /// Zeros any `pending_payout ≥ min_payout`, returning the payouts made.
    /// Actual payout transaction construction is a collaborator's concern.
    pub fn process_payouts(&mut self) -> Vec<(String, f64)> {
        let mut payouts = Vec::new();
        for (miner_id, record) in &mut self.miners {
            if record.pending_payout >= self.min_payout {
                payouts.push((miner_id.clone(), record.pending_payout));
                record.pending_payout = 0.0;
            }
        }
        payouts
    }

    #[must_use]
    pub fn record(&self, miner_id: &str) -> Option<&MinerRecord> {
        self.miners.get(miner_id)
    }

    #[must_use]
    pub fn total_hashrate(&self) -> f64 {
        self.total_hashrate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_accumulates_shares_and_hashrate() {
        let mut pool = MiningPool::new(1.0, 10.0);
        pool.update("m1", "addr1", 100.0, 5.0, 0);
        pool.update("m1", "addr1", 150.0, 3.0, 1);
        let record = pool.record("m1").unwrap();
        assert_eq!(record.hashrate, 150.0);
        assert_eq!(record.accumulated_shares, 8.0);
        assert_eq!(pool.total_hashrate(), 150.0);
    }

    #[test]
    fn compute_reward_zeros_shares_and_adds_payout() {
        let mut pool = MiningPool::new(1.0, 1.0);
        pool.update("m1", "addr1", 100.0, 50.0, 0);
        let reward = pool.compute_reward("m1", 1000.0).unwrap();
        assert!(reward > 0.0);
        assert_eq!(pool.record("m1").unwrap().accumulated_shares, 0.0);
        assert!(pool.record("m1").unwrap().pending_payout > 0.0);
    }

    #[test]
    fn process_payouts_only_clears_above_threshold() {
        let mut pool = MiningPool::new(1.0, 100.0);
        pool.update("m1", "addr1", 100.0, 50.0, 0);
        pool.compute_reward("m1", 10.0); // tiny reward, below min_payout
        let payouts = pool.process_payouts();
        assert!(payouts.is_empty());
        assert!(pool.record("m1").unwrap().pending_payout > 0.0);
    }
}
