use std::sync::{Arc, Barrier};
use std::thread;

use reviewbot_core::{ClaimKey, ClaimStatus, DiffChange, GeneratedText};
use reviewbot_storage::{ClaimStore, ResultCache};
use reviewbot_storage_sqlite::{SqliteClaimStore, SqliteResultCache};
use tempfile::tempdir;

fn diff(path: &str, body: &str) -> Vec<DiffChange> {
    vec![DiffChange {
        old_path: Some(path.into()),
        new_path: Some(path.into()),
        diff: body.into(),
        ..Default::default()
    }]
}

#[test]
fn test_claim_lifecycle() {
    let dir = tempdir().unwrap();
    let store = SqliteClaimStore::open(&dir.path().join("state.db")).unwrap();
    let key = ClaimKey::new(1, 10);

    assert_eq!(store.get_status(key), None);
    assert!(store.try_claim(key));
    assert!(!store.try_claim(key));

    store.mark_completed(key);
    assert_eq!(store.get_status(key), Some(ClaimStatus::Completed));

    // Completed claims survive a release and block future claims.
    store.release_claim(key);
    assert_eq!(store.get_status(key), Some(ClaimStatus::Completed));
    assert!(!store.try_claim(key));
}

#[test]
fn test_release_reopens_queued_claim() {
    let dir = tempdir().unwrap();
    let store = SqliteClaimStore::open(&dir.path().join("state.db")).unwrap();
    let key = ClaimKey::new(2, 7);

    assert!(store.try_claim(key));
    store.release_claim(key);
    assert_eq!(store.get_status(key), None);
    assert!(store.try_claim(key));
}

#[test]
fn test_mark_completed_on_absent_key_is_noop() {
    let dir = tempdir().unwrap();
    let store = SqliteClaimStore::open(&dir.path().join("state.db")).unwrap();
    store.mark_completed(ClaimKey::new(3, 3));
    assert_eq!(store.get_status(ClaimKey::new(3, 3)), None);
}

#[test]
fn test_claims_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");
    {
        let store = SqliteClaimStore::open(&path).unwrap();
        assert!(store.try_claim(ClaimKey::new(4, 1)));
        assert!(store.try_claim(ClaimKey::new(4, 2)));
        store.mark_completed(ClaimKey::new(4, 2));
    }
    let store = SqliteClaimStore::open(&path).unwrap();
    assert_eq!(store.get_status(ClaimKey::new(4, 1)), Some(ClaimStatus::Queued));
    assert_eq!(store.get_status(ClaimKey::new(4, 2)), Some(ClaimStatus::Completed));
    assert!(!store.try_claim(ClaimKey::new(4, 1)));
}

#[test]
fn test_concurrent_claims_have_one_winner() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");
    // Two handles on one file stand in for two processes.
    let stores = [
        Arc::new(SqliteClaimStore::open(&path).unwrap()),
        Arc::new(SqliteClaimStore::open(&path).unwrap()),
    ];
    let barrier = Arc::new(Barrier::new(8));
    let key = ClaimKey::new(5, 99);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = stores[i % 2].clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.try_claim(key)
            })
        })
        .collect();

    let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
    assert_eq!(winners, 1);
    assert_eq!(stores[0].get_status(key), Some(ClaimStatus::Queued));
}

#[test]
fn test_cache_hit_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let result = GeneratedText {
        content: "Consider extracting a helper.".into(),
        provider: "openai".into(),
        model: "gpt-5-mini".into(),
        elapsed_seconds: 2.25,
        input_tokens: Some(100),
        output_tokens: Some(20),
        total_tokens: Some(120),
    };
    {
        let cache = SqliteResultCache::open(&path).unwrap();
        cache.put("openai", "gpt-5-mini", &diff("src/lib.rs", "+fn a() {}"), &result);
    }
    let cache = SqliteResultCache::open(&path).unwrap();
    assert_eq!(cache.get("openai", "gpt-5-mini", &diff("src/lib.rs", "+fn a() {}")), Some(result));
    assert!(cache.get("openai", "gpt-5-mini", &diff("src/main.rs", "+fn a() {}")).is_none());
    assert_eq!(cache.entry_count().unwrap(), 1);
}

#[test]
fn test_claim_and_cache_share_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let store = SqliteClaimStore::open(&path).unwrap();
    let cache = SqliteResultCache::open(&path).unwrap();

    assert!(store.try_claim(ClaimKey::new(6, 1)));
    cache.put("ollama", "llama3", &diff("a.py", "+x"), &GeneratedText::default());
    assert!(cache.get("ollama", "llama3", &diff("a.py", "+x")).is_some());
    assert_eq!(store.get_status(ClaimKey::new(6, 1)), Some(ClaimStatus::Queued));
}
