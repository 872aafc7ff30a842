//! SQLite-backed [`VectorStore`] (the `local` backend).
//!
//! Vectors are stored as little-endian f32 BLOBs next to their JSON metadata.
//! Queries load every vector of the collection and rank them by cosine
//! similarity in process, which is fine for a personal document set.
//!
//! The connection pool and schema are created on first use, so constructing
//! the store touches nothing on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{
    validate_entries, validate_query, CollectionHandle, ScoredEntry, VectorEntry, VectorStore,
};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, Result};
use crate::models::Metadata;

const BACKEND: &str = "local";

pub struct SqliteVectorStore {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteVectorStore {
    pub fn new(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(RagError::Config("store.path must not be empty".to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            pool: OnceCell::new(),
        })
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            RagError::StoreUnavailable {
                                backend: BACKEND.to_string(),
                                message: format!("{}: {}", parent.display(), e),
                            }
                        })?;
                    }
                }

                let options = SqliteConnectOptions::new()
                    .filename(&self.path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal);

                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .map_err(|e| RagError::StoreUnavailable {
                        backend: BACKEND.to_string(),
                        message: format!("{}: {}", self.path.display(), e),
                    })?;

                run_migrations(&pool).await?;
                debug!(path = %self.path.display(), "opened local vector store");
                Ok::<SqlitePool, RagError>(pool)
            })
            .await
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    Ok(())
}

fn store_err(e: sqlx::Error) -> RagError {
    RagError::Store {
        backend: BACKEND.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn ping(&self) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map_err(|e| RagError::StoreUnavailable {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn get_or_create_collection(&self, name: &str, dims: usize) -> Result<CollectionHandle> {
        let pool = self.pool().await?;

        sqlx::query(
            "INSERT INTO collections (name, dims, created_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await
        .map_err(store_err)?;

        let stored: i64 = sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .map_err(store_err)?;

        if stored as usize != dims {
            return Err(RagError::DimensionMismatch {
                collection: name.to_string(),
                expected: dims,
                found: stored as usize,
            });
        }

        Ok(CollectionHandle {
            name: name.to_string(),
            dims,
        })
    }

    async fn upsert(&self, collection: &CollectionHandle, entries: &[VectorEntry]) -> Result<()> {
        validate_entries(collection, entries)?;
        if entries.is_empty() {
            return Ok(());
        }

        let pool = self.pool().await?;
        let now = chrono::Utc::now().timestamp();
        let mut tx = pool.begin().await.map_err(store_err)?;

        for entry in entries {
            let metadata_json = serde_json::to_string(&entry.metadata).map_err(|e| {
                RagError::Store {
                    backend: BACKEND.to_string(),
                    message: format!("metadata for '{}': {}", entry.id, e),
                }
            })?;
            sqlx::query(
                r#"
                INSERT INTO vectors (collection, id, embedding, metadata_json, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    embedding = excluded.embedding,
                    metadata_json = excluded.metadata_json,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&collection.name)
            .bind(&entry.id)
            .bind(vec_to_blob(&entry.vector))
            .bind(metadata_json)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        debug!(collection = %collection.name, count = entries.len(), "upserted vectors");
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredEntry>> {
        validate_query(collection, vector)?;
        let pool = self.pool().await?;

        let rows = sqlx::query("SELECT id, embedding, metadata_json FROM vectors WHERE collection = ?")
            .bind(&collection.name)
            .fetch_all(pool)
            .await
            .map_err(store_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| {
                RagError::Store {
                    backend: BACKEND.to_string(),
                    message: format!("corrupt metadata for '{}': {}", id, e),
                }
            })?;
            hits.push(ScoredEntry {
                score: cosine_similarity(vector, &blob_to_vec(&blob)),
                id,
                metadata,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let pool = self.pool().await?;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE collection = ?")
            .bind(&collection.name)
            .fetch_one(pool)
            .await
            .map_err(store_err)?;
        Ok(n as usize)
    }
}
