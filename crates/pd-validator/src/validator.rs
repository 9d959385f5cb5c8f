//! Two-phase share validation: a fast synchronous pre-check followed by
//! the CPU-bound SHA-256d proof-of-work check, offloaded to a small
//! fixed worker pool so it never blocks the async runtime.
use std::sync::Arc;

use pd_core::chain::ChainSnapshot;
use pd_core::constants::DEFAULT_VALIDATOR_WORKERS;
use pd_core::error::ValidationError;
use pd_core::hexutil;
use pd_core::types::{ShareSubmission, TrackedWork};
use pd_upstream::UpstreamClient;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::tracked::WorkTable;

pub struct WorkValidator {
    client: Arc<UpstreamClient>,
    table: WorkTable,
    chain: parking_lot::Mutex<ChainSnapshot>,
    target: [u8; 32],
    worker_pool: Semaphore,
}

impl WorkValidator {
    pub fn new(client: Arc<UpstreamClient>, target_hex: &str) -> Result<Arc<Self>, ValidationError> {
        let mut target = [0u8; 32];
        hex::decode_to_slice(target_hex, &mut target).map_err(|_| ValidationError::NotHex)?;

        Ok(Arc::new(Self {
            client,
            table: WorkTable::new(),
            chain: parking_lot::Mutex::new(ChainSnapshot::new()),
            target,
            worker_pool: Semaphore::new(DEFAULT_VALIDATOR_WORKERS),
        }))
    }

    pub fn current_block(&self) -> u64 {
        self.chain.lock().block_num
    }

    /// Records a template as having been handed to `user`, so a later
    /// submission against its merkle root can be checked.
    pub fn track_work_sent(&self, data: &str, user: String) {
        let tracked = TrackedWork::new(data, user);
        self.table.track(hexutil::merkle_root(data).to_string(), tracked);
    }

    /// Fast, non-blocking checks: length, known work, version, timestamp,
    /// nonce uniqueness, user identity, and previous-block-hash. Returns
    /// whether the matched work came from the previous block generation
    /// (the "possibly stale" flag), which [`Self::validate`] uses to
    /// decide the final outcome once the hash itself checks out.
    fn prevalidate(&self, submission: &ShareSubmission) -> Result<bool, ValidationError> {
        hexutil::check_length(&submission.data)?;

        let merkle_root = submission.merkle_root().to_string();
        let nonce = hexutil::nonce(&submission.data)?;
        let chain = self.chain.lock().clone();

        let outcome = self.table.with_tracked(&merkle_root, |tracked| {
            if hexutil::version(&submission.data) != tracked.version {
                return Err(ValidationError::VersionMismatch);
            }
            if hexutil::timestamp(&submission.data) != tracked.timestamp {
                return Err(ValidationError::TimestampMismatch);
            }
            tracked.record_nonce(nonce)?;
            if tracked.user != submission.user {
                return Err(ValidationError::UserMismatch);
            }

            let expected_prev_hash = if tracked.possibly_stale {
                chain.block_hash_prev.as_deref()
            } else {
                chain.block_hash.as_deref()
            };

            match expected_prev_hash {
                Some(hash) if hash == hexutil::prev_block_hash(&submission.data) => {
                    Ok(tracked.possibly_stale)
                }
                _ => Err(ValidationError::PrevBlockHashMismatch),
            }
        });

        outcome.ok_or(ValidationError::UnknownWork)?
    }

    /// Runs Phase 1 synchronously, then offloads the SHA-256d hash check
    /// to the worker pool. Succeeds only if the hash is below the pool's
    /// share target *and* the work was not flagged possibly-stale.
    pub async fn validate(&self, submission: ShareSubmission) -> Result<(), ValidationError> {
        let possibly_stale = self.prevalidate(&submission)?;

        let _permit = self
            .worker_pool
            .acquire()
            .await
            .expect("worker pool semaphore is never closed");

        let target = self.target;
        let data = submission.data;

        tokio::task::spawn_blocking(move || -> Result<(), ValidationError> {
            let preimage = hexutil::header_preimage(&data)?;

            let first = Sha256::digest(preimage);
            let second = Sha256::digest(first);
            let hash: [u8; 32] = second.into();

            if hexutil::compare_inverted(&hash, &target) == std::cmp::Ordering::Greater {
                return Err(ValidationError::HashAboveTarget);
            }
            Ok(())
        })
        .await
        .expect("validation worker panicked")?;

        if possibly_stale {
            return Err(ValidationError::Stale);
        }
        Ok(())
    }

    /// Demotes the current work generation to "previous" and kicks off
    /// re-resolution of the current block hash against the new height.
    pub fn notify_new_block(self: &Arc<Self>, block: u64) {
        self.table.rotate();
        self.chain.lock().block_num = block;

        let this = Arc::clone(self);
        tokio::spawn(async move { this.resolve_current_block_hash(block).await });
    }

    async fn resolve_current_block_hash(&self, block: u64) {
        // Matches the original's unconditional immediate retry on
        // failure: there is no backoff here by design.
        loop {
            match self.client.get_block_hash(block).await {
                Ok(hash) => {
                    let reordered = hexutil::reorder_block_hash(&hash);
                    let mut chain = self.chain.lock();
                    if chain.block_num == block {
                        chain.block_hash_prev = chain.block_hash.take();
                        chain.block_hash = Some(reordered);
                    }
                    return;
                }
                Err(e) => {
                    warn!(error = %e, block, "getblockhash failed, retrying immediately");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_hex() -> String {
        "ffffffffffffffffffffffffffffffffffffffffffffffffffffffff00000000"[..64].to_string()
    }

    #[tokio::test]
    async fn unknown_work_is_rejected() {
        let client = Arc::new(UpstreamClient::new("http://127.0.0.1:8332/", "u", "p"));
        let validator = WorkValidator::new(client, &target_hex()).unwrap();

        let submission = ShareSubmission {
            data: "0".repeat(256),
            user: "alice".into(),
        };

        let err = validator.validate(submission).await.unwrap_err();
        assert_eq!(err, ValidationError::UnknownWork);
    }

    #[tokio::test]
    async fn wrong_length_is_rejected_before_lookup() {
        let client = Arc::new(UpstreamClient::new("http://127.0.0.1:8332/", "u", "p"));
        let validator = WorkValidator::new(client, &target_hex()).unwrap();

        let submission = ShareSubmission {
            data: "abcd".into(),
            user: "alice".into(),
        };

        let err = validator.validate(submission).await.unwrap_err();
        assert_eq!(err, ValidationError::IncorrectLength);
    }

    #[tokio::test]
    async fn duplicate_nonce_is_rejected() {
        let client = Arc::new(UpstreamClient::new("http://127.0.0.1:8332/", "u", "p"));
        let validator = WorkValidator::new(client, &target_hex()).unwrap();

        let data = "0".repeat(256);
        validator.track_work_sent(&data, "alice".into());

        // First submission fails prevalidation (no resolved chain hash
        // to compare against yet), but it still consumes the nonce.
        let submission = ShareSubmission { data: data.clone(), user: "alice".into() };
        let _ = validator.validate(submission).await;

        let submission = ShareSubmission { data, user: "alice".into() };
        let err = validator.validate(submission).await.unwrap_err();
        assert_eq!(err, ValidationError::Duplicate);
    }
}
