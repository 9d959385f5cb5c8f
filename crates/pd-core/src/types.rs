//! Shared data model: block templates, tracked work, and share submissions.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::POOL_SHARE_TARGET_HEX;
use crate::error::ValidationError;
use crate::hexutil;

/// A block template as returned by the upstream node's `getwork` call (no
/// arguments). `data` is the 256 hex-char buffer miners hash against;
/// `target` is the network's real target, which the pool always rewrites
/// to [`POOL_SHARE_TARGET_HEX`] before handing the template to a miner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub data: String,
    pub target: String,
    /// Fields the upstream node includes (`midstate`, `hash1`, `algorithm`, ...)
    /// that the pool passes through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Template {
    pub fn merkle_root(&self) -> &str {
        hexutil::merkle_root(&self.data)
    }

    /// Returns a copy of this template with `target` replaced by the pool's
    /// fixed share target, ready to hand to a miner.
    pub fn for_miner(&self) -> Template {
        Template {
            data: self.data.clone(),
            target: POOL_SHARE_TARGET_HEX.to_string(),
            extra: self.extra.clone(),
        }
    }
}

/// Per-work bookkeeping the validator keeps for every template handed out,
/// keyed by merkle root. Tracks which nonces have already been submitted
/// for this work so duplicate shares are rejected.
#[derive(Debug, Clone)]
pub struct TrackedWork {
    pub user: String,
    pub version: String,
    pub timestamp: String,
    pub nonces: HashSet<u32>,
    /// Set when this entry is found in the *previous* generation table
    /// during lookup, meaning the work may belong to a block that has
    /// already been replaced.
    pub possibly_stale: bool,
}

impl TrackedWork {
    pub fn new(data: &str, user: String) -> Self {
        Self {
            user,
            version: hexutil::version(data).to_string(),
            timestamp: hexutil::timestamp(data).to_string(),
            nonces: HashSet::new(),
            possibly_stale: false,
        }
    }

    /// Records `nonce` as seen for this work. Unlike the original's
    /// fixed 16-slot ring buffer, this never drops history, so a nonce
    /// reused after 16 other submissions is still caught as a duplicate.
    pub fn record_nonce(&mut self, nonce: u32) -> Result<(), ValidationError> {
        if !self.nonces.insert(nonce) {
            return Err(ValidationError::Duplicate);
        }
        Ok(())
    }
}

/// A share submitted by a miner via `putwork`/`submitblock`-style calls.
#[derive(Debug, Clone)]
pub struct ShareSubmission {
    pub data: String,
    pub user: String,
}

impl ShareSubmission {
    pub fn merkle_root(&self) -> &str {
        hexutil::merkle_root(&self.data)
    }
}
