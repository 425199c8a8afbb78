use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use reviewbot_core::{ClaimKey, ClaimStatus, DiffChange, GeneratedText};

use crate::hash::content_hash;
use crate::traits::{ClaimStore, ResultCache};

/// In-memory claim store for tests. Not durable.
#[derive(Default)]
pub struct InMemoryClaimStore {
    claims: Mutex<HashMap<ClaimKey, ClaimStatus>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimStore for InMemoryClaimStore {
    fn try_claim(&self, key: ClaimKey) -> bool {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.contains_key(&key) {
            return false;
        }
        claims.insert(key, ClaimStatus::Queued);
        true
    }

    fn mark_completed(&self, key: ClaimKey) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = claims.get_mut(&key) {
            *status = ClaimStatus::Completed;
        }
    }

    fn release_claim(&self, key: ClaimKey) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.get(&key) == Some(&ClaimStatus::Queued) {
            claims.remove(&key);
        }
    }

    fn get_status(&self, key: ClaimKey) -> Option<ClaimStatus> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner).get(&key).copied()
    }
}

/// In-memory result cache for tests. Not durable.
#[derive(Default)]
pub struct InMemoryResultCache {
    entries: Mutex<HashMap<(String, String, String), GeneratedText>>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for InMemoryResultCache {
    fn get(&self, provider: &str, model: &str, changes: &[DiffChange]) -> Option<GeneratedText> {
        let key = (provider.to_string(), model.to_string(), content_hash(changes));
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(&key).cloned()
    }

    fn put(&self, provider: &str, model: &str, changes: &[DiffChange], result: &GeneratedText) {
        let key = (provider.to_string(), model.to_string(), content_hash(changes));
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(key, result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(diff: &str) -> Vec<DiffChange> {
        vec![DiffChange { new_path: Some("a.rs".into()), diff: diff.into(), ..Default::default() }]
    }

    fn result(content: &str) -> GeneratedText {
        GeneratedText {
            content: content.into(),
            provider: "openai".into(),
            model: "m".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_claim_only_once() {
        let store = InMemoryClaimStore::new();
        assert!(store.try_claim(ClaimKey::new(1, 10)));
        assert!(!store.try_claim(ClaimKey::new(1, 10)));
        assert_eq!(store.get_status(ClaimKey::new(1, 10)), Some(ClaimStatus::Queued));
    }

    #[test]
    fn test_release_only_removes_queued() {
        let store = InMemoryClaimStore::new();
        let key = ClaimKey::new(2, 20);
        assert!(store.try_claim(key));
        store.release_claim(key);
        assert_eq!(store.get_status(key), None);

        assert!(store.try_claim(key));
        store.mark_completed(key);
        store.release_claim(key);
        assert_eq!(store.get_status(key), Some(ClaimStatus::Completed));
        assert!(!store.try_claim(key));
    }

    #[test]
    fn test_mark_completed_absent_is_noop() {
        let store = InMemoryClaimStore::new();
        store.mark_completed(ClaimKey::new(3, 30));
        assert_eq!(store.get_status(ClaimKey::new(3, 30)), None);
    }

    #[test]
    fn test_cache_miss_then_hit() {
        let cache = InMemoryResultCache::new();
        assert!(cache.get("openai", "m", &changes("+1")).is_none());
        cache.put("openai", "m", &changes("+1"), &result("ok"));
        assert_eq!(cache.get("openai", "m", &changes("+1")).unwrap().content, "ok");
        assert!(cache.get("openai", "other", &changes("+1")).is_none());
        assert!(cache.get("openai", "m", &changes("+2")).is_none());
    }

    #[test]
    fn test_cache_put_overwrites() {
        let cache = InMemoryResultCache::new();
        cache.put("p", "m", &changes("+1"), &result("first"));
        cache.put("p", "m", &changes("+1"), &result("second"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("p", "m", &changes("+1")).unwrap().content, "second");
    }
}
