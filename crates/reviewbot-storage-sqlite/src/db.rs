use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::warn;

/// Open (or create) a database file and apply `schema`.
///
/// WAL plus a busy timeout lets several processes share the same file; the
/// unique keys in the schema are what make concurrent inserts safe.
pub(crate) fn open_connection(db_path: &Path, schema: &str) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db dir {}", parent.display()))?;
        }
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("open sqlite db {}", db_path.display()))?;
    conn.busy_timeout(Duration::from_secs(5)).context("set busy_timeout")?;

    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))
        .context("set journal_mode")?;
    if !mode.eq_ignore_ascii_case("wal") && !mode.eq_ignore_ascii_case("memory") {
        warn!(db = %db_path.display(), journal_mode = %mode, "WAL not available, falling back");
    }

    conn.execute_batch(schema).context("apply schema")?;
    Ok(conn)
}
