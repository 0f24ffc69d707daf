//! Denomination algebra: the coin family, conversion lattice, and the
//! Fibonacci-gated special-coin minting rules (spec §3, §4.2).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which of the two append-only chains a coin belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainTag {
    Golden,
    Silver,
}

/// The closed set of denominations the ledger knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoinType {
    // Golden family
    Leah,
    Shiblum,
    Shiblon,
    Senine,
    Seon,
    Shum,
    Limnah,
    Antion,
    // Silver family
    Senum,
    Amnor,
    Ezrom,
    Onti,
    // Special
    Ephraim,
    Manasseh,
    Joseph,
}

pub const ALL_COIN_TYPES: [CoinType; 15] = [
    CoinType::Leah,
    CoinType::Shiblum,
    CoinType::Shiblon,
    CoinType::Senine,
    CoinType::Seon,
    CoinType::Shum,
    CoinType::Limnah,
    CoinType::Antion,
    CoinType::Senum,
    CoinType::Amnor,
    CoinType::Ezrom,
    CoinType::Onti,
    CoinType::Ephraim,
    CoinType::Manasseh,
    CoinType::Joseph,
];

impl CoinType {
    /// Coins minted directly as a block reward.
    #[must_use]
    pub const fn is_mineable(self) -> bool {
        matches!(
            self,
            Self::Leah
                | Self::Shiblum
                | Self::Shiblon
                | Self::Senine
                | Self::Seon
                | Self::Shum
                | Self::Limnah
                | Self::Antion
                | Self::Senum
                | Self::Amnor
                | Self::Ezrom
                | Self::Onti
        )
    }

    /// Coins that may appear as an output on the chain other than their
    /// home chain.
    #[must_use]
    pub const fn can_cross_chain(self) -> bool {
        matches!(
            self,
            Self::Antion | Self::Senum | Self::Amnor | Self::Ezrom | Self::Onti
        )
    }

    /// The chain this coin is minted on, or `None` for coins unrestricted
    /// to either chain (Joseph).
    #[must_use]
    pub const fn chain_of(self) -> Option<ChainTag> {
        match self {
            Self::Leah
            | Self::Shiblum
            | Self::Shiblon
            | Self::Senine
            | Self::Seon
            | Self::Shum
            | Self::Limnah
            | Self::Antion
            | Self::Ephraim => Some(ChainTag::Golden),
            Self::Senum | Self::Amnor | Self::Ezrom | Self::Onti | Self::Manasseh => {
                Some(ChainTag::Silver)
            }
            Self::Joseph => None,
        }
    }

    /// PoW difficulty multiplier when mining a block rewarding this coin.
    /// Zero for coins that are not directly PoW-mineable as a block reward.
    #[must_use]
    pub const fn mining_difficulty(self) -> u32 {
        match self {
            Self::Leah => 1,
            Self::Shiblum => 2,
            Self::Shiblon => 4,
            _ => 0,
        }
    }

    /// Exact Leah-equivalent exchange rate (spec §3's conversion lattice).
    #[must_use]
    pub const fn convert_to_leah(self, amount: f64) -> f64 {
        let rate: f64 = match self {
            Self::Leah => 1.0,
            Self::Shiblum => 2.0,
            Self::Shiblon => 4.0,
            Self::Senine => 8.0,
            Self::Seon => 16.0,
            Self::Shum => 32.0,
            Self::Limnah => 56.0,
            Self::Antion => 24.0,
            Self::Senum => 8.0,
            Self::Amnor => 16.0,
            Self::Ezrom => 32.0,
            Self::Onti => 56.0,
            // Special coins have no fixed Leah-equivalent rate; the lattice
            // only covers the twelve mineable denominations.
            Self::Ephraim | Self::Manasseh | Self::Joseph => 0.0,
        };
        rate * amount
    }
}

/// Per-coin supply cap for the three special coins (spec §3).
#[must_use]
pub const fn special_coin_cap(coin: CoinType) -> Option<u64> {
    match coin {
        CoinType::Ephraim => Some(15_000_000),
        CoinType::Manasseh => Some(15_000_000),
        CoinType::Joseph => Some(3_000_000),
        _ => None,
    }
}

/// A balance map consumed/produced by the special-mint operations below.
pub type BalanceMap = HashMap<CoinType, u64>;

fn has_at_least(balances: &BalanceMap, coin: CoinType, amount: u64) -> bool {
    balances.get(&coin).copied().unwrap_or(0) >= amount
}

fn consume(balances: &mut BalanceMap, coin: CoinType, amount: u64) {
    *balances.entry(coin).or_insert(0) -= amount;
}

/// Attempts to mint one Ephraim from the Fibonacci-gated component coins.
/// Returns the new balances (with components consumed and Ephraim credited)
/// on success, or the original balances unchanged on failure — no partial
/// mutation is ever observable.
#[must_use]
pub fn try_mint_ephraim(balances: &BalanceMap, current_supply: u64) -> (bool, BalanceMap) {
    const REQUIREMENTS: [(CoinType, u64); 8] = [
        (CoinType::Leah, 1),
        (CoinType::Shiblum, 1),
        (CoinType::Shiblon, 2),
        (CoinType::Senine, 3),
        (CoinType::Seon, 5),
        (CoinType::Shum, 8),
        (CoinType::Limnah, 13),
        (CoinType::Antion, 21),
    ];
    mint_special(
        balances,
        CoinType::Ephraim,
        current_supply,
        &REQUIREMENTS,
    )
}

/// Attempts to mint one Manasseh from its Fibonacci-gated components.
#[must_use]
pub fn try_mint_manasseh(balances: &BalanceMap, current_supply: u64) -> (bool, BalanceMap) {
    const REQUIREMENTS: [(CoinType, u64); 5] = [
        (CoinType::Senum, 1),
        (CoinType::Amnor, 1),
        (CoinType::Ezrom, 2),
        (CoinType::Onti, 3),
        (CoinType::Antion, 1),
    ];
    mint_special(
        balances,
        CoinType::Manasseh,
        current_supply,
        &REQUIREMENTS,
    )
}

/// Attempts to mint one Joseph by consuming one Ephraim and one Manasseh.
#[must_use]
pub fn try_mint_joseph(balances: &BalanceMap, current_supply: u64) -> (bool, BalanceMap) {
    const REQUIREMENTS: [(CoinType, u64); 2] = [(CoinType::Ephraim, 1), (CoinType::Manasseh, 1)];
    mint_special(balances, CoinType::Joseph, current_supply, &REQUIREMENTS)
}

fn mint_special(
    balances: &BalanceMap,
    minted: CoinType,
    current_supply: u64,
    requirements: &[(CoinType, u64)],
) -> (bool, BalanceMap) {
    if let Some(cap) = special_coin_cap(minted) {
        if current_supply >= cap {
            return (false, balances.clone());
        }
    }
    if !requirements
        .iter()
        .all(|&(coin, amount)| has_at_least(balances, coin, amount))
    {
        return (false, balances.clone());
    }
    let mut next = balances.clone();
    for &(coin, amount) in requirements {
        consume(&mut next, coin, amount);
    }
    *next.entry(minted).or_insert(0) += 1;
    (true, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mineable_set_matches_spec() {
        assert!(CoinType::Leah.is_mineable());
        assert!(CoinType::Onti.is_mineable());
        assert!(!CoinType::Ephraim.is_mineable());
        assert!(!CoinType::Joseph.is_mineable());
    }

    #[test]
    fn transferable_set_matches_spec() {
        assert!(CoinType::Antion.can_cross_chain());
        assert!(CoinType::Senum.can_cross_chain());
        assert!(!CoinType::Leah.can_cross_chain());
        assert!(!CoinType::Ephraim.can_cross_chain());
    }

    #[test]
    fn mining_difficulty_multipliers() {
        assert_eq!(CoinType::Leah.mining_difficulty(), 1);
        assert_eq!(CoinType::Shiblum.mining_difficulty(), 2);
        assert_eq!(CoinType::Shiblon.mining_difficulty(), 4);
        assert_eq!(CoinType::Senine.mining_difficulty(), 0);
    }

    #[test]
    fn conversion_lattice_matches_spec() {
        assert_eq!(CoinType::Shiblum.convert_to_leah(1.0), 2.0);
        assert_eq!(CoinType::Shiblon.convert_to_leah(1.0), 4.0);
        assert_eq!(CoinType::Limnah.convert_to_leah(1.0), 56.0);
        assert_eq!(CoinType::Onti.convert_to_leah(1.0), 56.0);
    }

    #[test]
    fn ephraim_mint_consumes_exact_fibonacci_amounts() {
        let mut balances = BalanceMap::new();
        balances.insert(CoinType::Leah, 1);
        balances.insert(CoinType::Shiblum, 1);
        balances.insert(CoinType::Shiblon, 2);
        balances.insert(CoinType::Senine, 3);
        balances.insert(CoinType::Seon, 5);
        balances.insert(CoinType::Shum, 8);
        balances.insert(CoinType::Limnah, 13);
        balances.insert(CoinType::Antion, 21);

        let (ok, after) = try_mint_ephraim(&balances, 0);
        assert!(ok);
        assert_eq!(after[&CoinType::Leah], 0);
        assert_eq!(after[&CoinType::Antion], 0);
        assert_eq!(after[&CoinType::Ephraim], 1);
    }

    #[test]
    fn ephraim_mint_fails_one_short_with_no_mutation() {
        let mut balances = BalanceMap::new();
        balances.insert(CoinType::Leah, 1);
        balances.insert(CoinType::Shiblum, 1);
        balances.insert(CoinType::Shiblon, 2);
        balances.insert(CoinType::Senine, 3);
        balances.insert(CoinType::Seon, 5);
        balances.insert(CoinType::Shum, 8);
        balances.insert(CoinType::Limnah, 13);
        balances.insert(CoinType::Antion, 20); // one short

        let (ok, after) = try_mint_ephraim(&balances, 0);
        assert!(!ok);
        assert_eq!(after, balances);
    }

    #[test]
    fn special_coin_cap_blocks_further_minting() {
        let mut balances = BalanceMap::new();
        balances.insert(CoinType::Ephraim, 1);
        balances.insert(CoinType::Manasseh, 1);

        let (ok, _) = try_mint_joseph(&balances, 3_000_000);
        assert!(!ok);
    }
}
