//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow: directories → documents → chunks and images →
//! vectors → collections. Per-path and per-file problems are recorded in the
//! [`IngestionReport`] and never abort a run; store, model and collection
//! errors do.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};

use crate::chunk::chunk_document;
use crate::collections::CollectionManager;
use crate::config::{ChunkingConfig, Config, IngestConfig};
use crate::discover::{discover_files, load_document};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{RagError, Result};
use crate::models::{Document, IngestionReport, Modality, SkippedPath};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::store::{create_store, CollectionHandle, VectorEntry, VectorStore};

pub struct IngestionPipeline {
    collections: CollectionManager,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    ingest: IngestConfig,
    upsert_batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(config: &Config, store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            collections: CollectionManager::new(store, embedder.text_dims(), embedder.image_dims()),
            embedder,
            chunking: config.chunking.clone(),
            ingest: config.ingest.clone(),
            upsert_batch_size: config.store.upsert_batch_size.max(1),
        }
    }

    /// Ingest every valid directory in `paths`.
    pub async fn ingest(
        &self,
        paths: &[PathBuf],
        progress: &dyn IngestProgressReporter,
    ) -> Result<IngestionReport> {
        let mut report = IngestionReport::default();

        let mut roots = Vec::new();
        for path in paths {
            match validate_root(path) {
                Ok(root) => roots.push(root),
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "skipping input path");
                    report.skipped_paths.push(SkippedPath {
                        path: path.display().to_string(),
                        reason,
                    });
                }
            }
        }
        if roots.is_empty() {
            report.no_valid_directories = true;
            return Ok(report);
        }

        let collections = self.collections.ensure_collections().await?;

        for root in &roots {
            progress.report(IngestProgressEvent::Discovering { root: root.clone() });
        }
        let discovery = discover_files(&roots, &self.ingest)?;
        report.skipped_files.extend(discovery.skipped);

        let mut text_docs: Vec<Document> = Vec::new();
        let mut image_docs: Vec<Document> = Vec::new();
        for path in &discovery.files {
            match load_document(path) {
                Ok(doc) => match doc.modality {
                    Modality::Text => text_docs.push(doc),
                    Modality::Image => image_docs.push(doc),
                },
                Err(e) => skip_or_fail(&mut report, e)?,
            }
        }
        report.documents_loaded = text_docs.len() + image_docs.len();
        progress.report(IngestProgressEvent::Loaded {
            text: text_docs.len() as u64,
            images: image_docs.len() as u64,
        });
        info!(
            text = text_docs.len(),
            images = image_docs.len(),
            "documents loaded"
        );

        report.text_chunks_indexed = self
            .index_text(&collections.text, &text_docs, progress)
            .await?;
        report.images_indexed = self
            .index_images(&collections.image, &image_docs, &mut report.skipped_files, progress)
            .await?;

        info!(
            text_chunks = report.text_chunks_indexed,
            images = report.images_indexed,
            skipped_files = report.skipped_files.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    /// Chunk all text documents and embed every chunk in one call.
    async fn index_text(
        &self,
        collection: &CollectionHandle,
        docs: &[Document],
        progress: &dyn IngestProgressReporter,
    ) -> Result<usize> {
        let chunks: Vec<_> = docs
            .iter()
            .flat_map(|doc| {
                chunk_document(doc, self.chunking.chunk_size, self.chunking.chunk_overlap)
            })
            .collect();
        if chunks.is_empty() {
            return Ok(0);
        }

        let total = chunks.len() as u64;
        progress.report(IngestProgressEvent::Embedding {
            modality: Modality::Text,
            n: 0,
            total,
        });
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_text(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding {
                model: self.embedder.text_model().to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    vectors.len()
                ),
            });
        }
        progress.report(IngestProgressEvent::Embedding {
            modality: Modality::Text,
            n: total,
            total,
        });

        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut metadata = chunk.metadata;
                metadata.insert("text".to_string(), Value::String(chunk.text));
                VectorEntry {
                    id: chunk.id,
                    vector: vector.values,
                    metadata,
                }
            })
            .collect();

        self.store_entries(collection, &entries, Modality::Text, progress)
            .await
    }

    /// Embed images one at a time; an image that cannot be embedded is skipped.
    async fn index_images(
        &self,
        collection: &CollectionHandle,
        docs: &[Document],
        skipped: &mut Vec<SkippedPath>,
        progress: &dyn IngestProgressReporter,
    ) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let total = docs.len() as u64;
        let mut entries = Vec::with_capacity(docs.len());
        for (i, doc) in docs.iter().enumerate() {
            match self.embedder.embed_image(&doc.path).await {
                Ok(vector) => entries.push(VectorEntry {
                    id: format!("{}#0", doc.file_path()),
                    vector: vector.values,
                    metadata: doc.metadata.clone(),
                }),
                Err(e) if e.is_content() => {
                    warn!(path = %doc.path.display(), error = %e, "skipping image");
                    skipped.push(SkippedPath {
                        path: doc.file_path(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
            progress.report(IngestProgressEvent::Embedding {
                modality: Modality::Image,
                n: i as u64 + 1,
                total,
            });
        }

        self.store_entries(collection, &entries, Modality::Image, progress)
            .await
    }

    async fn store_entries(
        &self,
        collection: &CollectionHandle,
        entries: &[VectorEntry],
        modality: Modality,
        progress: &dyn IngestProgressReporter,
    ) -> Result<usize> {
        let store = self.collections.store();
        for batch in entries.chunks(self.upsert_batch_size) {
            store.upsert(collection, batch).await?;
        }
        progress.report(IngestProgressEvent::Stored {
            modality,
            count: entries.len() as u64,
        });
        Ok(entries.len())
    }
}

/// An ingest root must be an existing directory. Returns its canonical path
/// or the reason it was rejected.
fn validate_root(path: &Path) -> std::result::Result<PathBuf, String> {
    if !path.exists() {
        return Err("path does not exist".to_string());
    }
    if !path.is_dir() {
        return Err("path is not a directory".to_string());
    }
    path.canonicalize().map_err(|e| e.to_string())
}

fn skip_or_fail(report: &mut IngestionReport, e: RagError) -> Result<()> {
    match e {
        RagError::Content { path, message } => {
            warn!(%path, error = %message, "skipping file");
            report.skipped_files.push(SkippedPath {
                path,
                reason: message,
            });
            Ok(())
        }
        other => Err(other),
    }
}

/// Run the `ingest` command and print a summary.
pub async fn run_ingest(
    config: &Config,
    paths: &[PathBuf],
    mode: ProgressMode,
) -> anyhow::Result<()> {
    let store = create_store(config)?;
    let embedder = create_embedder(&config.embedding)?;
    let pipeline = IngestionPipeline::new(config, store, embedder);
    let reporter = mode.reporter();

    let report = pipeline
        .ingest(paths, reporter.as_ref())
        .await
        .context("Ingestion failed")?;

    for skipped in &report.skipped_paths {
        eprintln!("  skipped {}: {}", skipped.path, skipped.reason);
    }
    if report.no_valid_directories {
        println!("No valid directories to ingest.");
        return Ok(());
    }
    if report.documents_loaded == 0 {
        println!("No documents found in any directory.");
    }

    println!("ingest");
    println!("  documents loaded: {}", report.documents_loaded);
    println!("  text chunks indexed: {}", report.text_chunks_indexed);
    println!("  images indexed: {}", report.images_indexed);
    if !report.skipped_files.is_empty() {
        println!("  files skipped: {}", report.skipped_files.len());
        for skipped in &report.skipped_files {
            println!("    {}: {}", skipped.path, skipped.reason);
        }
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_root() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(validate_root(tmp.path()).is_ok());
        assert_eq!(
            validate_root(&tmp.path().join("missing")).unwrap_err(),
            "path does not exist"
        );
        assert_eq!(validate_root(&file).unwrap_err(), "path is not a directory");
    }

    #[test]
    fn test_skip_or_fail() {
        let mut report = IngestionReport::default();
        skip_or_fail(
            &mut report,
            RagError::Content {
                path: "a.bin".into(),
                message: "file is not valid UTF-8 text".into(),
            },
        )
        .unwrap();
        assert_eq!(report.skipped_files.len(), 1);
        assert!(skip_or_fail(&mut report, RagError::Llm("down".into())).is_err());
    }
}
