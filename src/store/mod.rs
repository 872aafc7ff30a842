//! Vector-store abstraction.
//!
//! The [`VectorStore`] trait is the single interface the pipeline uses for
//! persistence and nearest-neighbour search. Backends:
//! - **`local`** ([`SqliteVectorStore`]): one SQLite file, brute-force cosine scan.
//! - **`qdrant`** (`QdrantVectorStore`): a remote Qdrant server over gRPC.
//! - **`memory`** ([`InMemoryVectorStore`]): process-local, nothing persisted.
//!
//! Use [`create_store`] to pick the backend named in the configuration.
//!
//! All backends share the same contract: collection creation is idempotent
//! and checks dimensionality, and an upsert is validated in full before any
//! entry is written.

pub mod memory;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::error::{RagError, Result};
use crate::models::Metadata;

pub use memory::InMemoryVectorStore;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
pub use sqlite::SqliteVectorStore;

/// A collection known to exist with the given dimensionality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub name: String,
    pub dims: usize,
}

/// One vector to write.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// One query hit.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: String,
    /// Cosine similarity.
    pub score: f32,
    pub metadata: Metadata,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// `"local"`, `"qdrant"` or `"memory"`.
    fn backend_name(&self) -> &'static str;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<()>;

    /// Create `name` with `dims` if absent, otherwise return the existing
    /// collection. A different stored dimensionality is a
    /// [`RagError::DimensionMismatch`].
    async fn get_or_create_collection(&self, name: &str, dims: usize) -> Result<CollectionHandle>;

    /// Insert or replace entries by id.
    async fn upsert(&self, collection: &CollectionHandle, entries: &[VectorEntry]) -> Result<()>;

    /// At most `top_k` entries by descending cosine similarity.
    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredEntry>>;

    async fn count(&self, collection: &CollectionHandle) -> Result<usize>;
}

/// Check every entry against the collection's dimensionality.
///
/// Called by every backend before it writes anything, so one bad vector
/// rejects the whole batch.
pub fn validate_entries(collection: &CollectionHandle, entries: &[VectorEntry]) -> Result<()> {
    for entry in entries {
        if entry.vector.len() != collection.dims {
            return Err(RagError::DimensionMismatch {
                collection: format!("{} (entry '{}')", collection.name, entry.id),
                expected: collection.dims,
                found: entry.vector.len(),
            });
        }
    }
    Ok(())
}

/// Check a query vector against the collection's dimensionality.
pub fn validate_query(collection: &CollectionHandle, vector: &[f32]) -> Result<()> {
    if vector.len() != collection.dims {
        return Err(RagError::DimensionMismatch {
            collection: collection.name.clone(),
            expected: collection.dims,
            found: vector.len(),
        });
    }
    Ok(())
}

/// Create the backend selected by `store.backend`.
///
/// No connection is made here; the first operation connects.
pub fn create_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Local => Ok(Arc::new(SqliteVectorStore::new(&config.store.path)?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
        #[cfg(feature = "qdrant")]
        StoreBackend::Qdrant => Ok(Arc::new(QdrantVectorStore::new(
            &config.store.qdrant_url,
            config.store.qdrant_api_key.clone(),
            config.request_timeout(),
        )?)),
        #[cfg(not(feature = "qdrant"))]
        StoreBackend::Qdrant => Err(RagError::Config(
            "Qdrant backend requires --features qdrant".to_string(),
        )),
    }
}
