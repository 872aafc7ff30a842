//! In-memory [`VectorStore`] for tests and dry runs.
//!
//! Collections live in a `HashMap` behind a `tokio::sync::RwLock`. Search is a
//! brute-force cosine scan. Nothing survives the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    validate_entries, validate_query, CollectionHandle, ScoredEntry, VectorEntry, VectorStore,
};
use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::Metadata;

struct MemCollection {
    dims: usize,
    entries: HashMap<String, (Vec<f32>, Metadata)>,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(name: &str) -> RagError {
    RagError::Store {
        backend: "memory".to_string(),
        message: format!("collection '{}' does not exist", name),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_or_create_collection(&self, name: &str, dims: usize) -> Result<CollectionHandle> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| MemCollection {
                dims,
                entries: HashMap::new(),
            });
        if collection.dims != dims {
            return Err(RagError::DimensionMismatch {
                collection: name.to_string(),
                expected: dims,
                found: collection.dims,
            });
        }
        Ok(CollectionHandle {
            name: name.to_string(),
            dims,
        })
    }

    async fn upsert(&self, collection: &CollectionHandle, entries: &[VectorEntry]) -> Result<()> {
        validate_entries(collection, entries)?;
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(&collection.name)
            .ok_or_else(|| missing(&collection.name))?;
        for entry in entries {
            stored.entries.insert(
                entry.id.clone(),
                (entry.vector.clone(), entry.metadata.clone()),
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredEntry>> {
        validate_query(collection, vector)?;
        let collections = self.collections.read().await;
        let stored = collections
            .get(&collection.name)
            .ok_or_else(|| missing(&collection.name))?;

        let mut hits: Vec<ScoredEntry> = stored
            .entries
            .iter()
            .map(|(id, (v, metadata))| ScoredEntry {
                id: id.clone(),
                score: cosine_similarity(vector, v),
                metadata: metadata.clone(),
            })
            .collect();
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
        let collections = self.collections.read().await;
        collections
            .get(&collection.name)
            .map(|c| c.entries.len())
            .ok_or_else(|| missing(&collection.name))
    }
}
