use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use reviewbot_core::{ClaimKey, ClaimStatus};
use reviewbot_storage::ClaimStore;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::error;

use crate::db::open_connection;

/// Full claim row, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRecord {
    pub key: ClaimKey,
    pub status: ClaimStatus,
    pub updated_at: String,
}

/// Durable claim table. `try_claim` relies on the primary key, never on a prior read.
pub struct SqliteClaimStore {
    conn: Mutex<Connection>,
}

impl SqliteClaimStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_connection(db_path, include_str!("../migrations/0001_claims.sql"))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("claim store connection mutex poisoned"))
    }

    fn insert_queued(&self, key: ClaimKey) -> Result<bool> {
        let conn = self.conn()?;
        let res = conn.execute(
            "INSERT INTO claims(project_id, merge_request_iid, status, updated_at)
             VALUES (?1, ?2, 'queued', datetime('now'))",
            params![key.project_id, key.merge_request_iid],
        );
        match res {
            Ok(_) => Ok(true),
            // Primary key already taken: someone else owns (or finished) this key.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(e).context("insert claim"),
        }
    }

    fn set_completed(&self, key: ClaimKey) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE claims SET status='completed', updated_at=datetime('now')
             WHERE project_id=?1 AND merge_request_iid=?2",
            params![key.project_id, key.merge_request_iid],
        )
        .context("complete claim")?;
        Ok(())
    }

    fn delete_queued(&self, key: ClaimKey) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM claims WHERE project_id=?1 AND merge_request_iid=?2 AND status='queued'",
            params![key.project_id, key.merge_request_iid],
        )
        .context("release claim")?;
        Ok(())
    }

    /// Read the whole row. Errors are returned, unlike the `ClaimStore` methods.
    pub fn record(&self, key: ClaimKey) -> Result<Option<ClaimRecord>> {
        let conn = self.conn()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT status, updated_at FROM claims
                 WHERE project_id=?1 AND merge_request_iid=?2",
                params![key.project_id, key.merge_request_iid],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .context("read claim")?;

        match row {
            None => Ok(None),
            Some((status, updated_at)) => {
                let status = ClaimStatus::parse(&status)
                    .ok_or_else(|| anyhow!("unknown claim status '{}'", status))?;
                Ok(Some(ClaimRecord { key, status, updated_at }))
            }
        }
    }
}

impl ClaimStore for SqliteClaimStore {
    fn try_claim(&self, key: ClaimKey) -> bool {
        self.insert_queued(key).unwrap_or_else(|err| {
            error!(claim = %key, error = ?err, "failed to claim slot");
            false
        })
    }

    fn mark_completed(&self, key: ClaimKey) {
        if let Err(err) = self.set_completed(key) {
            error!(claim = %key, error = ?err, "failed to mark claim completed");
        }
    }

    fn release_claim(&self, key: ClaimKey) {
        if let Err(err) = self.delete_queued(key) {
            error!(claim = %key, error = ?err, "failed to release claim");
        }
    }

    fn get_status(&self, key: ClaimKey) -> Option<ClaimStatus> {
        match self.record(key) {
            Ok(record) => record.map(|r| r.status),
            Err(err) => {
                error!(claim = %key, error = ?err, "failed to read claim status");
                None
            }
        }
    }
}
