use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::hash::Fingerprint;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("a record already exists for this fingerprint")]
    DuplicateFingerprint,
    #[error("index database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable mapping from content fingerprint to stored blob name.
///
/// `insert` must be an atomic insert-if-absent: when two workers race on the
/// same fingerprint, exactly one wins and the other gets
/// `DuplicateFingerprint`. A prior `lookup` is a fast path only, never a
/// correctness guarantee.
#[async_trait]
pub trait DedupIndex: Send + Sync {
    async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<String>, IndexError>;
    async fn insert(&self, fingerprint: &Fingerprint, stored_name: &str) -> Result<(), IndexError>;
}

/// SQLite-backed index. The primary key on `fingerprint` is the dedup
/// arbiter; `stored_name` carries its own unique constraint so two records
/// can never share a blob.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub async fn open(path: &Path) -> Result<Self, IndexError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                fingerprint TEXT PRIMARY KEY,
                stored_name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&pool)
        .await?;
        info!(path = %path.display(), "dedup index ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl DedupIndex for SqliteIndex {
    async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<String>, IndexError> {
        let row = sqlx::query("SELECT stored_name FROM files WHERE fingerprint = ?1")
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("stored_name")))
    }

    async fn insert(&self, fingerprint: &Fingerprint, stored_name: &str) -> Result<(), IndexError> {
        let result = sqlx::query("INSERT INTO files (fingerprint, stored_name) VALUES (?1, ?2)")
            .bind(fingerprint.as_str())
            .bind(stored_name)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(IndexError::DuplicateFingerprint)
            }
            Err(e) => Err(e.into()),
        }
    }
}
