//! Question-time retrieval across both collections.
//!
//! The question is embedded twice: into the text space for `rag_text`, and
//! through the image model's text tower for `rag_images`. Hits from both
//! collections are merged by score, reduced to one per file name, and turned
//! into the grounding context handed to the language model.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::collections::CollectionManager;
use crate::config::{Config, RetrievalConfig};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::models::{Modality, RetrievedSource};
use crate::store::{ScoredEntry, VectorStore};

const TRUNCATION_MARKER: &str = "...";

/// A retrieved source together with the full chunk text behind its excerpt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub source: RetrievedSource,
    /// Chunk text for text hits; empty for images.
    pub text: String,
}

impl RetrievedChunk {
    fn from_scored(entry: ScoredEntry, modality: Modality, excerpt_max_chars: usize) -> Self {
        let field = |key: &str| {
            entry
                .metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let file_path = field("file_path");
        let file_name = match field("file_name") {
            name if name.is_empty() => file_path.clone(),
            name => name,
        };
        let text = match modality {
            Modality::Text => field("text"),
            Modality::Image => String::new(),
        };
        Self {
            source: RetrievedSource {
                file_name,
                file_path,
                modality,
                score: entry.score,
                excerpt: truncate_excerpt(&text, excerpt_max_chars),
            },
            text,
        }
    }
}

pub struct RetrievalEngine {
    collections: CollectionManager,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(config: &Config, store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            collections: CollectionManager::new(store, embedder.text_dims(), embedder.image_dims()),
            embedder,
            config: config.retrieval.clone(),
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Ranked, deduplicated chunks for `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let collections = self.collections.ensure_collections().await?;
        let store = self.collections.store();
        let top_k = self.config.top_k;

        let query = self.embedder.embed_text(&[question.to_string()]).await?;
        let text_vector = query.into_iter().next().ok_or_else(|| RagError::Embedding {
            model: self.embedder.text_model().to_string(),
            message: "no embedding returned for question".to_string(),
        })?;
        let text_hits = store
            .query(&collections.text, &text_vector.values, top_k)
            .await?;

        let image_hits = match self.embedder.embed_text_for_images(question).await? {
            Some(vector) => {
                store
                    .query(&collections.image, &vector.values, top_k)
                    .await?
            }
            None => {
                warn!(
                    image_model = self.embedder.image_model(),
                    "image model has no text encoder; skipping image retrieval"
                );
                Vec::new()
            }
        };
        debug!(
            text_hits = text_hits.len(),
            image_hits = image_hits.len(),
            top_k,
            "retrieved"
        );

        let max = self.config.excerpt_max_chars;
        let merged = text_hits
            .into_iter()
            .map(|e| RetrievedChunk::from_scored(e, Modality::Text, max))
            .chain(
                image_hits
                    .into_iter()
                    .map(|e| RetrievedChunk::from_scored(e, Modality::Image, max)),
            )
            .collect();
        Ok(dedup_by_file_name(merged))
    }
}

/// Sort by descending score and keep the best hit per file name.
///
/// The sort is stable, so equal scores keep their input order.
pub fn dedup_by_file_name(mut hits: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    hits.sort_by(|a, b| b.source.score.total_cmp(&a.source.score));
    let mut seen = HashSet::new();
    hits.retain(|hit| seen.insert(hit.source.file_name.clone()));
    hits
}

/// Cut `text` to `max_chars` characters, appending `...` when cut.
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Render the grounding context, one numbered block per source.
pub fn build_context(chunks: &[RetrievedChunk], max_chars: Option<usize>) -> String {
    let blocks: Vec<String> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let s = &chunk.source;
            match s.modality {
                Modality::Text => {
                    format!("[{}] {} ({})\n{}", i + 1, s.file_name, s.file_path, chunk.text)
                }
                Modality::Image => format!("[{}] image: {} ({})", i + 1, s.file_name, s.file_path),
            }
        })
        .collect();
    let context = blocks.join("\n\n");

    match max_chars {
        Some(max) => match context.char_indices().nth(max) {
            Some((byte_idx, _)) => context[..byte_idx].to_string(),
            None => context,
        },
        None => context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn hit(file_name: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            source: RetrievedSource {
                file_name: file_name.to_string(),
                file_path: format!("/docs/{}", file_name),
                modality: Modality::Text,
                score,
                excerpt: String::new(),
            },
            text: format!("text of {}", file_name),
        }
    }

    fn ranked(hits: &[RetrievedChunk]) -> Vec<(&str, f32)> {
        hits.iter()
            .map(|h| (h.source.file_name.as_str(), h.source.score))
            .collect()
    }

    #[test]
    fn test_dedup_keeps_highest_score_per_file() {
        let hits = vec![hit("a.txt", 0.9), hit("b.txt", 0.7), hit("a.txt", 0.95)];
        let out = dedup_by_file_name(hits);
        assert_eq!(ranked(&out), vec![("a.txt", 0.95), ("b.txt", 0.7)]);
    }

    #[test]
    fn test_dedup_ties_keep_first_seen() {
        let hits = vec![hit("x.md", 0.5), hit("y.md", 0.5), hit("z.md", 0.8)];
        let out = dedup_by_file_name(hits);
        assert_eq!(ranked(&out), vec![("z.md", 0.8), ("x.md", 0.5), ("y.md", 0.5)]);
    }

    #[test]
    fn test_truncate_excerpt() {
        let long = "a".repeat(250);
        let cut = truncate_excerpt(&long, 200);
        assert_eq!(cut.len(), 203);
        assert!(cut.starts_with(&"a".repeat(200)));
        assert!(cut.ends_with("..."));

        let short = "b".repeat(150);
        assert_eq!(truncate_excerpt(&short, 200), short);

        let exact = "c".repeat(200);
        assert_eq!(truncate_excerpt(&exact, 200), exact);
    }

    #[test]
    fn test_truncate_excerpt_counts_chars() {
        let text = "é".repeat(5);
        assert_eq!(truncate_excerpt(&text, 3), "ééé...");
    }

    #[test]
    fn test_from_scored_image_has_no_excerpt() {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".into(), "cat.png".into());
        metadata.insert("file_path".into(), "/pics/cat.png".into());
        let chunk = RetrievedChunk::from_scored(
            ScoredEntry {
                id: "/pics/cat.png#0".into(),
                score: 0.3,
                metadata,
            },
            Modality::Image,
            200,
        );
        assert_eq!(chunk.source.modality, Modality::Image);
        assert_eq!(chunk.source.file_name, "cat.png");
        assert!(chunk.source.excerpt.is_empty());
    }

    #[test]
    fn test_build_context_blocks() {
        let mut image = hit("cat.png", 0.4);
        image.source.modality = Modality::Image;
        let context = build_context(&[hit("a.txt", 0.9), image], None);
        assert_eq!(
            context,
            "[1] a.txt (/docs/a.txt)\ntext of a.txt\n\n[2] image: cat.png (/docs/cat.png)"
        );
    }

    #[test]
    fn test_build_context_empty_and_capped() {
        assert_eq!(build_context(&[], None), "");
        let context = build_context(&[hit("a.txt", 0.9)], Some(10));
        assert_eq!(context.chars().count(), 10);
    }
}
