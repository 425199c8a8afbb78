use reviewbot_core::{ClaimKey, ClaimStatus, DiffChange, GeneratedText};

/// Idempotency guard for one-shot jobs.
///
/// Implementations never surface storage errors: they log and answer as if
/// the claim was not obtained (or the call was a no-op).
pub trait ClaimStore: Send + Sync {
    /// Insert `(key, queued)` atomically. `true` only for the caller whose insert won.
    fn try_claim(&self, key: ClaimKey) -> bool;
    /// `queued` -> `completed`. Absent keys are ignored.
    fn mark_completed(&self, key: ClaimKey);
    /// Delete the record only while it is still `queued`.
    fn release_claim(&self, key: ClaimKey);
    fn get_status(&self, key: ClaimKey) -> Option<ClaimStatus>;
}

/// Content-addressed store of generated results, keyed by
/// `(provider, model, content_hash(changes))`.
///
/// A failed read is a miss and a failed write is dropped.
pub trait ResultCache: Send + Sync {
    fn get(&self, provider: &str, model: &str, changes: &[DiffChange]) -> Option<GeneratedText>;
    fn put(&self, provider: &str, model: &str, changes: &[DiffChange], result: &GeneratedText);
}
