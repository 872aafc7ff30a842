//! Local embeddings through fastembed (bundled ONNX runtime).
//!
//! Model weights are downloaded from Hugging Face on first use and cached on
//! disk; after that no network access is needed. Each model is loaded at most
//! once per process and kept for the embedder's lifetime. Inference is
//! CPU-bound, so it always runs on the blocking pool.

use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{
    image_model_spec, text_model_spec, Embedder, EmbeddingVector, ImageModelSpec, TextModelSpec,
};
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::models::Modality;

type Slot<M> = Arc<Mutex<Option<M>>>;

/// Embedder running text and image models in-process.
pub struct LocalEmbedder {
    text_spec: TextModelSpec,
    image_spec: ImageModelSpec,
    batch_size: usize,
    cache_dir: Option<PathBuf>,
    text: Slot<TextEmbedding>,
    image: Slot<ImageEmbedding>,
    /// Text tower of the image model. Shares `text` when both are the same model.
    image_text: Option<(TextModelSpec, Slot<TextEmbedding>)>,
}

impl LocalEmbedder {
    /// Resolve model names. No weights are loaded here.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let text_spec = text_model_spec(&config.text_model)?;
        let image_spec = image_model_spec(&config.image_model)?;
        let text: Slot<TextEmbedding> = Arc::new(Mutex::new(None));

        let image_text = match image_spec.text_tower {
            Some(name) if name == text_spec.name => Some((text_spec, Arc::clone(&text))),
            Some(name) => Some((text_model_spec(name)?, Arc::new(Mutex::new(None)))),
            None => None,
        };

        Ok(Self {
            text_spec,
            image_spec,
            batch_size: config.batch_size,
            cache_dir: config.cache_dir.clone(),
            text,
            image: Arc::new(Mutex::new(None)),
            image_text,
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn text_model(&self) -> &str {
        self.text_spec.name
    }

    fn image_model(&self) -> &str {
        self.image_spec.name
    }

    fn text_dims(&self) -> usize {
        self.text_spec.dims
    }

    fn image_dims(&self) -> usize {
        self.image_spec.dims
    }

    async fn embed_text(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let name = self.text_spec.name;
        debug!(model = name, count = texts.len(), "embedding text");
        let raw = run_text_model(
            Arc::clone(&self.text),
            name,
            self.cache_dir.clone(),
            texts.to_vec(),
            self.batch_size,
        )
        .await?;

        raw.into_iter()
            .map(|v| EmbeddingVector::normalized(Modality::Text, v, name))
            .collect()
    }

    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector> {
        let name = self.image_spec.name;
        let slot = Arc::clone(&self.image);
        let cache_dir = self.cache_dir.clone();
        let path = path.to_path_buf();

        let raw = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            if !path.is_file() {
                return Err(content_error(&path, "image file is not readable"));
            }
            let mut guard = lock(&slot, name)?;
            let model = match guard.take() {
                Some(model) => model,
                None => {
                    info!(model = name, "loading image embedding model");
                    ImageEmbedding::try_new(image_init_options(name, cache_dir)?)
                        .map_err(|e| embedding_error(name, e))?
                }
            };
            let model = guard.insert(model);
            let mut out = model
                .embed(vec![path.clone()], None)
                .map_err(|e| content_error(&path, e))?;
            out.pop()
                .ok_or_else(|| embedding_error(name, "empty image embedding response"))
        })
        .await
        .map_err(|e| embedding_error(name, e))??;

        EmbeddingVector::normalized(Modality::Image, raw, name)
    }

    async fn embed_text_for_images(&self, text: &str) -> Result<Option<EmbeddingVector>> {
        let Some((spec, slot)) = &self.image_text else {
            return Ok(None);
        };
        let mut raw = run_text_model(
            Arc::clone(slot),
            spec.name,
            self.cache_dir.clone(),
            vec![text.to_string()],
            self.batch_size,
        )
        .await?;
        let v = raw
            .pop()
            .ok_or_else(|| embedding_error(spec.name, "empty text embedding response"))?;
        EmbeddingVector::normalized(Modality::Image, v, spec.name).map(Some)
    }
}

async fn run_text_model(
    slot: Slot<TextEmbedding>,
    name: &'static str,
    cache_dir: Option<PathBuf>,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let expected = texts.len();
    let out = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
        let mut guard = lock(&slot, name)?;
        let model = match guard.take() {
            Some(model) => model,
            None => {
                info!(model = name, "loading text embedding model");
                TextEmbedding::try_new(text_init_options(name, cache_dir)?)
                    .map_err(|e| embedding_error(name, e))?
            }
        };
        let model = guard.insert(model);
        model
            .embed(texts, Some(batch_size))
            .map_err(|e| embedding_error(name, e))
    })
    .await
    .map_err(|e| embedding_error(name, e))??;

    if out.len() != expected {
        return Err(embedding_error(
            name,
            format!("expected {} embeddings, got {}", expected, out.len()),
        ));
    }
    Ok(out)
}

fn lock<'a, M>(slot: &'a Mutex<Option<M>>, name: &str) -> Result<MutexGuard<'a, Option<M>>> {
    slot.lock()
        .map_err(|_| embedding_error(name, "model lock poisoned by an earlier panic"))
}

fn text_init_options(name: &str, cache_dir: Option<PathBuf>) -> Result<InitOptions> {
    let model = match name {
        "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
        "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "multilingual-e5-large" => EmbeddingModel::MultilingualE5Large,
        "nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
        "clip-vit-b-32" => EmbeddingModel::ClipVitB32,
        other => {
            return Err(RagError::Config(format!(
                "Unknown text embedding model: '{}'",
                other
            )))
        }
    };
    let mut options = InitOptions::new(model).with_show_download_progress(true);
    if let Some(dir) = cache_dir {
        options = options.with_cache_dir(dir);
    }
    Ok(options)
}

fn image_init_options(name: &str, cache_dir: Option<PathBuf>) -> Result<ImageInitOptions> {
    let model = match name {
        "clip-vit-b-32" => ImageEmbeddingModel::ClipVitB32,
        "resnet50" => ImageEmbeddingModel::Resnet50,
        "nomic-embed-vision-v1.5" => ImageEmbeddingModel::NomicEmbedVisionV15,
        other => {
            return Err(RagError::Config(format!(
                "Unknown image embedding model: '{}'",
                other
            )))
        }
    };
    let mut options = ImageInitOptions::new(model).with_show_download_progress(true);
    if let Some(dir) = cache_dir {
        options = options.with_cache_dir(dir);
    }
    Ok(options)
}

fn embedding_error(model: &str, e: impl std::fmt::Display) -> RagError {
    RagError::Embedding {
        model: model.to_string(),
        message: e.to_string(),
    }
}

fn content_error(path: &Path, e: impl std::fmt::Display) -> RagError {
    RagError::Content {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str, image: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            text_model: text.to_string(),
            image_model: image.to_string(),
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_dims_known_without_loading() {
        let embedder = LocalEmbedder::new(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.text_dims(), 1024);
        assert_eq!(embedder.image_dims(), 512);
        assert!(embedder.text.lock().unwrap().is_none());
        assert!(embedder.image.lock().unwrap().is_none());
    }

    #[test]
    fn test_clip_text_tower_shared_with_text_model() {
        let embedder = LocalEmbedder::new(&config("clip-vit-b-32", "clip-vit-b-32")).unwrap();
        let (spec, slot) = embedder.image_text.as_ref().unwrap();
        assert_eq!(spec.name, "clip-vit-b-32");
        assert!(Arc::ptr_eq(slot, &embedder.text));
    }

    #[test]
    fn test_resnet_has_no_text_tower() {
        let embedder = LocalEmbedder::new(&config("bge-base-en-v1.5", "resnet50")).unwrap();
        assert!(embedder.image_text.is_none());
        assert_eq!(embedder.image_dims(), 2048);
    }

    #[tokio::test]
    async fn test_empty_text_batch_skips_model() {
        let embedder = LocalEmbedder::new(&EmbeddingConfig::default()).unwrap();
        let out = embedder.embed_text(&[]).await.unwrap();
        assert!(out.is_empty());
        assert!(embedder.text.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_image_is_content_error() {
        let embedder = LocalEmbedder::new(&EmbeddingConfig::default()).unwrap();
        let err = embedder
            .embed_image(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(err.is_content());
        assert!(embedder.image.lock().unwrap().is_none());
    }
}
