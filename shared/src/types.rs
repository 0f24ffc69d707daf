//! Primitive type aliases shared across the ledger crates.

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Block height within a single chain.
pub type BlockHeight = u64;

/// Index of an output within a transaction.
pub type OutputIndex = u32;
