//! Embedding abstraction and vector utilities.
//!
//! The [`Embedder`] trait is the only way the pipeline touches a model. It
//! covers three operations:
//! - text into the text space ([`Embedder::embed_text`]),
//! - an image file into the image space ([`Embedder::embed_image`]),
//! - text into the image space ([`Embedder::embed_text_for_images`]), which is
//!   how a question is matched against the image collection.
//!
//! Every vector leaving an embedder is L2-normalized by [`normalize_l2`], so
//! cosine similarity reduces to a dot product in every backend.
//!
//! Model names map to fixed dimensionalities through a static table, so the
//! collection manager can size collections without loading any weights.

#[cfg(feature = "local-embeddings-fastembed")]
mod local;

#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::models::Modality;

/// Norms below this are treated as degenerate.
const MIN_NORM: f32 = 1e-12;

/// A unit-length vector tagged with the space it lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    pub space: Modality,
    pub values: Vec<f32>,
}

impl EmbeddingVector {
    /// Normalize `raw` and tag it. Fails on a zero-norm vector.
    pub fn normalized(space: Modality, raw: Vec<f32>, model: &str) -> Result<Self> {
        Ok(Self {
            space,
            values: normalize_l2(raw, model)?,
        })
    }
}

/// Text model known to the local runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextModelSpec {
    pub name: &'static str,
    pub dims: usize,
}

/// Image model known to the local runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageModelSpec {
    pub name: &'static str,
    pub dims: usize,
    /// Text model sharing this model's vector space, if any.
    pub text_tower: Option<&'static str>,
}

pub const TEXT_MODELS: &[TextModelSpec] = &[
    TextModelSpec { name: "all-minilm-l6-v2", dims: 384 },
    TextModelSpec { name: "bge-small-en-v1.5", dims: 384 },
    TextModelSpec { name: "bge-base-en-v1.5", dims: 768 },
    TextModelSpec { name: "bge-large-en-v1.5", dims: 1024 },
    TextModelSpec { name: "multilingual-e5-large", dims: 1024 },
    TextModelSpec { name: "nomic-embed-text-v1.5", dims: 768 },
    TextModelSpec { name: "clip-vit-b-32", dims: 512 },
];

pub const IMAGE_MODELS: &[ImageModelSpec] = &[
    ImageModelSpec { name: "clip-vit-b-32", dims: 512, text_tower: Some("clip-vit-b-32") },
    ImageModelSpec { name: "resnet50", dims: 2048, text_tower: None },
    ImageModelSpec { name: "nomic-embed-vision-v1.5", dims: 768, text_tower: Some("nomic-embed-text-v1.5") },
];

pub fn text_model_spec(name: &str) -> Result<TextModelSpec> {
    TEXT_MODELS
        .iter()
        .find(|m| m.name == name)
        .copied()
        .ok_or_else(|| {
            RagError::Config(format!(
                "Unknown text embedding model: '{}'. Supported models: {}",
                name,
                TEXT_MODELS.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
            ))
        })
}

pub fn image_model_spec(name: &str) -> Result<ImageModelSpec> {
    IMAGE_MODELS
        .iter()
        .find(|m| m.name == name)
        .copied()
        .ok_or_else(|| {
            RagError::Config(format!(
                "Unknown image embedding model: '{}'. Supported models: {}",
                name,
                IMAGE_MODELS.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
            ))
        })
}

/// Text and image embedding behind one interface.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn text_model(&self) -> &str;
    fn image_model(&self) -> &str;
    fn text_dims(&self) -> usize;
    fn image_dims(&self) -> usize;

    /// Embed texts into the text space, one vector per input, in order.
    /// An empty slice returns an empty vector without touching the model.
    async fn embed_text(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    /// Embed one image file. Unreadable or undecodable images are
    /// [`RagError::Content`] errors.
    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector>;

    /// Embed text into the image space. `None` when the image model has no
    /// text tower, in which case image retrieval is skipped.
    async fn embed_text_for_images(&self, text: &str) -> Result<Option<EmbeddingVector>>;
}

/// Create the embedder for this configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    text_model_spec(&config.text_model)?;
    image_model_spec(&config.image_model)?;

    #[cfg(feature = "local-embeddings-fastembed")]
    {
        Ok(Arc::new(LocalEmbedder::new(config)?))
    }
    #[cfg(not(feature = "local-embeddings-fastembed"))]
    {
        Err(RagError::Config(
            "Local embeddings require --features local-embeddings-fastembed".to_string(),
        ))
    }
}

/// Scale `v` to unit length.
///
/// A vector whose norm is below `1e-12` cannot be normalized and is reported
/// as an embedding error rather than passed on as zeros.
pub fn normalize_l2(mut v: Vec<f32>, model: &str) -> Result<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm < MIN_NORM {
        return Err(RagError::Embedding {
            model: model.to_string(),
            message: "model produced a zero-norm vector".to_string(),
        });
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Ok(v)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
