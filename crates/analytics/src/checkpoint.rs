//! Run fingerprints and skip-if-unchanged.
//!
//! Before a run, the candidate checkpoint (window bounds, vocabulary
//! fingerprint, session count) is compared against the latest stored
//! one; an exact match means the stored result can be returned without
//! re-executing any sub-detector. After a successful run, the result
//! is persisted first, then the checkpoint — both atomically — so a
//! crash between the two only costs a redundant recomputation, never a
//! dangling checkpoint.

use store::KeyValueStore;
use tracing::{debug, info};

use crate::error::RunResult;
use crate::types::{AnalysisCheckpoint, AnalysisResult};

pub struct CheckpointManager<'s> {
    store: &'s dyn KeyValueStore,
}

impl<'s> CheckpointManager<'s> {
    pub fn new(store: &'s dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Build the candidate fingerprint for a run about to start.
    pub fn candidate(
        window_start_unix: i64,
        window_end_unix: i64,
        vocabulary_fingerprint: String,
        session_count: usize,
        result_key: String,
    ) -> AnalysisCheckpoint {
        AnalysisCheckpoint {
            window_start_unix,
            window_end_unix,
            vocabulary_fingerprint,
            session_count,
            result_key,
        }
    }

    /// Returns the stored result if the latest checkpoint under
    /// `checkpoint_key` describes exactly the same input window.
    pub fn try_skip(
        &self,
        checkpoint_key: &str,
        candidate: &AnalysisCheckpoint,
    ) -> RunResult<Option<AnalysisResult>> {
        let Some(bytes) = self.store.get(checkpoint_key)? else {
            return Ok(None);
        };
        let stored: AnalysisCheckpoint = match serde_json::from_slice(&bytes) {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                // A checkpoint we cannot read is treated as absent; the
                // run recomputes and overwrites it.
                debug!(error = %err, key = checkpoint_key, "unreadable checkpoint, recomputing");
                return Ok(None);
            }
        };
        if !stored.same_input(candidate) {
            return Ok(None);
        }

        let Some(result_bytes) = self.store.get(&stored.result_key)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<AnalysisResult>(&result_bytes) {
            Ok(mut result) => {
                info!(
                    key = checkpoint_key,
                    window_start = stored.window_start_unix,
                    window_end = stored.window_end_unix,
                    "window unchanged, serving checkpointed result"
                );
                result.from_checkpoint = true;
                Ok(Some(result))
            }
            Err(err) => {
                debug!(error = %err, key = %stored.result_key, "unreadable stored result, recomputing");
                Ok(None)
            }
        }
    }

    /// Persist the result, then the checkpoint referencing it.
    pub fn commit(
        &self,
        checkpoint_key: &str,
        checkpoint: &AnalysisCheckpoint,
        result: &AnalysisResult,
    ) -> RunResult<()> {
        let result_bytes = serde_json::to_vec(result)?;
        self.store.put_atomic(&checkpoint.result_key, &result_bytes)?;
        let checkpoint_bytes = serde_json::to_vec(checkpoint)?;
        self.store.put_atomic(checkpoint_key, &checkpoint_bytes)?;
        Ok(())
    }
}
