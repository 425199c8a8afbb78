use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use reviewbot_core::{DiffChange, GeneratedText};
use reviewbot_storage::{content_hash, ResultCache};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::db::open_connection;

/// Durable result cache keyed by `(provider, model, content_hash)`.
pub struct SqliteResultCache {
    conn: Mutex<Connection>,
}

impl SqliteResultCache {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_connection(db_path, include_str!("../migrations/0001_result_cache.sql"))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("result cache connection mutex poisoned"))
    }

    /// Lookup by precomputed hash. Errors are returned, unlike `ResultCache::get`.
    pub fn read(&self, provider: &str, model: &str, hash: &str) -> Result<Option<GeneratedText>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT result_json FROM result_cache
                 WHERE provider=?1 AND model=?2 AND content_hash=?3",
                params![provider, model, hash],
                |r| r.get(0),
            )
            .optional()
            .context("read cache entry")?;

        match json {
            None => Ok(None),
            Some(s) => Ok(Some(serde_json::from_str(&s).context("decode cached result")?)),
        }
    }

    pub fn write(
        &self,
        provider: &str,
        model: &str,
        hash: &str,
        result: &GeneratedText,
    ) -> Result<()> {
        let json = serde_json::to_string(result)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO result_cache(provider, model, content_hash, result_json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(provider, model, content_hash)
             DO UPDATE SET result_json = excluded.result_json",
            params![provider, model, hash, json],
        )
        .context("upsert cache entry")?;
        Ok(())
    }

    pub fn entry_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM result_cache", [], |r| r.get(0))
            .context("count cache entries")?;
        Ok(n as u64)
    }
}

impl ResultCache for SqliteResultCache {
    fn get(&self, provider: &str, model: &str, changes: &[DiffChange]) -> Option<GeneratedText> {
        let hash = content_hash(changes);
        match self.read(provider, model, &hash) {
            Ok(hit) => {
                debug!(provider, model, content_hash = %hash, hit = hit.is_some(), "cache lookup");
                hit
            }
            Err(err) => {
                warn!(
                    provider,
                    model,
                    content_hash = %hash,
                    error = ?err,
                    "cache read failed, treating as miss"
                );
                None
            }
        }
    }

    fn put(&self, provider: &str, model: &str, changes: &[DiffChange], result: &GeneratedText) {
        let hash = content_hash(changes);
        if let Err(err) = self.write(provider, model, &hash, result) {
            warn!(
                provider,
                model,
                content_hash = %hash,
                error = ?err,
                "cache write failed, dropping entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn changes(diff: &str) -> Vec<DiffChange> {
        vec![DiffChange {
            old_path: Some("a.rs".into()),
            new_path: Some("a.rs".into()),
            diff: diff.into(),
            ..Default::default()
        }]
    }

    fn result(content: &str) -> GeneratedText {
        GeneratedText {
            content: content.into(),
            provider: "openai".into(),
            model: "gpt-5-mini".into(),
            elapsed_seconds: 1.5,
            total_tokens: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn miss_then_hit() {
        let dir = tempdir().unwrap();
        let cache = SqliteResultCache::open(&dir.path().join("cache.db")).unwrap();
        assert!(cache.get("openai", "gpt-5-mini", &changes("+x")).is_none());

        cache.put("openai", "gpt-5-mini", &changes("+x"), &result("looks fine"));
        assert_eq!(cache.get("openai", "gpt-5-mini", &changes("+x")), Some(result("looks fine")));
        assert!(cache.get("openai", "other-model", &changes("+x")).is_none());
        assert!(cache.get("gemini", "gpt-5-mini", &changes("+x")).is_none());
        assert!(cache.get("openai", "gpt-5-mini", &changes("+y")).is_none());
    }

    #[test]
    fn put_replaces_existing_entry() {
        let dir = tempdir().unwrap();
        let cache = SqliteResultCache::open(&dir.path().join("cache.db")).unwrap();
        cache.put("openai", "gpt-5-mini", &changes("+x"), &result("first"));
        cache.put("openai", "gpt-5-mini", &changes("+x"), &result("second"));
        assert_eq!(cache.entry_count().unwrap(), 1);
        assert_eq!(cache.get("openai", "gpt-5-mini", &changes("+x")).unwrap().content, "second");
    }

    #[test]
    fn corrupt_payload_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = SqliteResultCache::open(&dir.path().join("cache.db")).unwrap();
        let hash = content_hash(&changes("+x"));
        cache
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO result_cache(provider, model, content_hash, result_json)
                 VALUES ('openai', 'm', ?1, 'not json')",
                params![hash],
            )
            .unwrap();
        assert!(cache.read("openai", "m", &hash).is_err());
        assert!(cache.get("openai", "m", &changes("+x")).is_none());
    }

    #[test]
    fn storage_errors_are_swallowed() {
        let dir = tempdir().unwrap();
        let cache = SqliteResultCache::open(&dir.path().join("cache.db")).unwrap();
        cache.conn.lock().unwrap().execute_batch("DROP TABLE result_cache;").unwrap();
        cache.put("openai", "m", &changes("+x"), &result("dropped"));
        assert!(cache.get("openai", "m", &changes("+x")).is_none());
        assert!(cache.entry_count().is_err());
    }
}
