//! Core data models shared by ingestion and retrieval.
//!
//! Documents and chunks are transient: they only live for the duration of an
//! `ingest` run. What survives is the vector entry written to a collection,
//! whose metadata is the document metadata below.

use serde::Serialize;
use std::path::PathBuf;

/// Metadata attached to a stored vector.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Which embedding space a document or vector belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
        }
    }

    /// Classify a MIME type. Anything that is not `image/*` is text.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Modality::Image
        } else {
            Modality::Text
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file discovered under one of the ingest roots.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub modality: Modality,
    /// Extracted UTF-8 text. Empty for image documents, which are read by the
    /// image embedder straight from `path`.
    pub body: String,
    /// `file_name`, `file_path`, `modality`, `mime_type`, `file_size`, `last_modified`.
    pub metadata: Metadata,
}

impl Document {
    pub fn file_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// A contiguous character window of a text document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// `"{file_path}#{char_offset}"`, stable across re-ingestion.
    pub id: String,
    pub chunk_index: usize,
    /// Offset of the first character, counted in Unicode scalar values.
    pub char_offset: usize,
    pub text: String,
    pub metadata: Metadata,
}

/// One source cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedSource {
    pub file_name: String,
    pub file_path: String,
    pub modality: Modality,
    pub score: f32,
    pub excerpt: String,
}

/// The result of a single question.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<RetrievedSource>,
}

/// An input path or file that ingestion passed over, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPath {
    pub path: String,
    pub reason: String,
}

/// Summary of one `ingest` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub text_chunks_indexed: usize,
    pub images_indexed: usize,
    pub documents_loaded: usize,
    /// Input paths that were not existing directories.
    pub skipped_paths: Vec<SkippedPath>,
    /// Files that could not be read, decoded or embedded.
    pub skipped_files: Vec<SkippedPath>,
    pub no_valid_directories: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_from_mime() {
        assert_eq!(Modality::from_mime("image/png"), Modality::Image);
        assert_eq!(Modality::from_mime("image/jpeg"), Modality::Image);
        assert_eq!(Modality::from_mime("text/plain"), Modality::Text);
        assert_eq!(Modality::from_mime("application/pdf"), Modality::Text);
    }

    #[test]
    fn test_modality_serializes_lowercase() {
        let json = serde_json::to_string(&Modality::Image).unwrap();
        assert_eq!(json, "\"image\"");
    }
}
