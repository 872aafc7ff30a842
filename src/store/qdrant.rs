//! Qdrant [`VectorStore`] over gRPC.
//!
//! Qdrant point ids must be unsigned integers or UUIDs, so every entry id is
//! mapped to a UUID v5 (URL namespace) of the id string. The entry id itself is
//! kept in the payload under `entry_id` and restored on query. Because the
//! mapping is deterministic, re-ingesting a file overwrites its points.

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{
    validate_entries, validate_query, CollectionHandle, ScoredEntry, VectorEntry, VectorStore,
};
use crate::error::{RagError, Result};
use crate::models::Metadata;

const BACKEND: &str = "qdrant";
/// Payload key holding the caller's entry id.
const ENTRY_ID_KEY: &str = "entry_id";

pub struct QdrantVectorStore {
    client: Qdrant,
    url: String,
}

impl QdrantVectorStore {
    /// Build a client. No request is sent until the first operation.
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("invalid Qdrant configuration: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn unavailable(&self, e: QdrantError) -> RagError {
        RagError::StoreUnavailable {
            backend: BACKEND.to_string(),
            message: format!("{}: {}", self.url, e),
        }
    }

    /// Vector size of an existing collection.
    async fn stored_dims(&self, name: &str) -> Result<usize> {
        let info = self.client.collection_info(name).await.map_err(map_err)?;
        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        match params {
            Some(VectorsConfigKind::Params(p)) => Ok(p.size as usize),
            Some(VectorsConfigKind::ParamsMap(_)) => Err(RagError::Store {
                backend: BACKEND.to_string(),
                message: format!("collection '{}' uses named vectors, which are not supported", name),
            }),
            None => Err(RagError::Store {
                backend: BACKEND.to_string(),
                message: format!("collection '{}' has no vector configuration", name),
            }),
        }
    }
}

fn map_err(e: QdrantError) -> RagError {
    RagError::Store {
        backend: BACKEND.to_string(),
        message: e.to_string(),
    }
}

/// Deterministic point id for an entry id.
pub fn point_id(entry_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, entry_id.as_bytes()).to_string()
}

fn to_json(value: &QdrantValue) -> Value {
    match &value.kind {
        Some(Kind::NullValue(_)) | None => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => Value::from(*i),
        Some(Kind::DoubleValue(d)) => Value::from(*d),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .health_check()
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(())
    }

    async fn get_or_create_collection(&self, name: &str, dims: usize) -> Result<CollectionHandle> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| self.unavailable(e))?;
        let exists = collections.collections.iter().any(|c| c.name == name);

        if exists {
            let found = self.stored_dims(name).await?;
            if found != dims {
                return Err(RagError::DimensionMismatch {
                    collection: name.to_string(),
                    expected: dims,
                    found,
                });
            }
            debug!(collection = name, dims, "qdrant collection already exists");
        } else {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name)
                        .vectors_config(VectorParamsBuilder::new(dims as u64, Distance::Cosine)),
                )
                .await
                .map_err(map_err)?;
            debug!(collection = name, dims, "created qdrant collection");
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

        let mut points = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut payload_map = entry.metadata.clone();
            payload_map.insert(ENTRY_ID_KEY.to_string(), Value::String(entry.id.clone()));
            let payload = Payload::try_from(Value::Object(payload_map)).map_err(map_err)?;
            points.push(PointStruct::new(
                point_id(&entry.id),
                entry.vector.clone(),
                payload,
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&collection.name, points).wait(true))
            .await
            .map_err(map_err)?;

        debug!(collection = %collection.name, count = entries.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredEntry>> {
        validate_query(collection, vector)?;
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&collection.name, vector.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(map_err)?;

        let hits = response
            .result
            .into_iter()
            .map(|scored| {
                let mut metadata: Metadata = scored
                    .payload
                    .iter()
                    .map(|(k, v)| (k.clone(), to_json(v)))
                    .collect();
                let id = match metadata.remove(ENTRY_ID_KEY) {
                    Some(Value::String(s)) => s,
                    _ => scored
                        .id
                        .as_ref()
                        .and_then(|pid| match &pid.point_id_options {
                            Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                            Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                            None => None,
                        })
                        .unwrap_or_default(),
                };
                ScoredEntry {
                    id,
                    score: scored.score,
                    metadata,
                }
            })
            .collect();

        Ok(hits)
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&collection.name).exact(true))
            .await
            .map_err(map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = point_id("/docs/a.txt#0");
        let b = point_id("/docs/a.txt#0");
        let c = point_id("/docs/a.txt#824");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_payload_values_to_json() {
        assert_eq!(to_json(&QdrantValue::from("a.txt")), Value::from("a.txt"));
        assert_eq!(to_json(&QdrantValue::from(2i64)), Value::from(2));
        assert_eq!(to_json(&QdrantValue::from(true)), Value::Bool(true));
        assert_eq!(to_json(&QdrantValue { kind: None }), Value::Null);
    }

    #[test]
    fn test_new_does_not_connect() {
        let store =
            QdrantVectorStore::new("http://localhost:6334", None, Duration::from_secs(5)).unwrap();
        assert_eq!(store.backend_name(), "qdrant");
    }
}
