//! Minimal chain-height/hash bookkeeping shared between the monitor,
//! the validator and the round manager.

/// The pool's view of the upstream chain tip at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub block_num: u64,
    /// Current block hash, byte-group-reordered for direct comparison
    /// against a template's previous-block-hash field. `None` until the
    /// first `getblockhash` round-trip completes.
    pub block_hash: Option<String>,
    pub block_hash_prev: Option<String>,
}

impl ChainSnapshot {
    pub fn new() -> Self {
        Self::default()
    }
}
