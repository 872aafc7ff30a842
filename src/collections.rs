//! Collection lifecycle for the two modality collections.
//!
//! Text chunks live in `rag_text`, images in `rag_images`. Each collection is
//! sized from its embedder's output dimensionality, which is known from the
//! model name alone, so ensuring collections never loads a model.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::store::{CollectionHandle, VectorStore};

pub const TEXT_COLLECTION: &str = "rag_text";
pub const IMAGE_COLLECTION: &str = "rag_images";

/// Handles for both collections, valid for the rest of the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub text: CollectionHandle,
    pub image: CollectionHandle,
}

pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
    text_dims: usize,
    image_dims: usize,
}

impl CollectionManager {
    pub fn new(store: Arc<dyn VectorStore>, text_dims: usize, image_dims: usize) -> Self {
        Self {
            store,
            text_dims,
            image_dims,
        }
    }

    /// Create both collections if absent. Safe to call on every command.
    pub async fn ensure_collections(&self) -> Result<Collections> {
        let text = self
            .store
            .get_or_create_collection(TEXT_COLLECTION, self.text_dims)
            .await?;
        let image = self
            .store
            .get_or_create_collection(IMAGE_COLLECTION, self.image_dims)
            .await?;
        debug!(
            backend = self.store.backend_name(),
            text_dims = self.text_dims,
            image_dims = self.image_dims,
            "collections ready"
        );
        Ok(Collections { text, image })
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }
}
