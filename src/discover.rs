//! File discovery and document loading.
//!
//! Walks each ingest root, filters what should never be indexed, and turns
//! each remaining file into a [`Document`] classified by its guessed MIME
//! type.

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::IngestConfig;
use crate::error::{RagError, Result};
use crate::extract;
use crate::models::{Document, Metadata, Modality, SkippedPath};

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Files found under the ingest roots, plus what was passed over.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Sorted, without duplicates.
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedPath>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RagError::Config(format!("invalid exclude glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::Config(format!("invalid exclude globs: {}", e)))
}

/// Recursively list indexable files under every root.
pub fn discover_files(roots: &[PathBuf], config: &IngestConfig) -> Result<Discovery> {
    let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    patterns.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&patterns)?;

    let mut discovery = Discovery::default();

    for root in roots {
        let walker = WalkDir::new(root)
            .follow_links(config.follow_symlinks)
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    warn!(path = %path, error = %e, "skipping unreadable entry");
                    discovery.skipped.push(SkippedPath {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if exclude_set.is_match(relative) {
                debug!(path = %path.display(), "excluded by glob");
                continue;
            }

            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    discovery.skipped.push(SkippedPath {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if size > config.max_file_bytes {
                warn!(path = %path.display(), size, "skipping oversized file");
                discovery.skipped.push(SkippedPath {
                    path: path.display().to_string(),
                    reason: format!(
                        "file is {} bytes, larger than max_file_bytes ({})",
                        size, config.max_file_bytes
                    ),
                });
                continue;
            }

            discovery.files.push(path.to_path_buf());
        }
    }

    discovery.files.sort();
    discovery.files.dedup();
    Ok(discovery)
}

/// Guess the MIME type from the file extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Build a [`Document`] for `path`.
///
/// Image documents are not read here; the image embedder reads the file.
/// Text that cannot be extracted is a [`RagError::Content`] error.
pub fn load_document(path: &Path) -> Result<Document> {
    let content_err = |message: String| RagError::Content {
        path: path.display().to_string(),
        message,
    };

    let fs_meta = std::fs::metadata(path).map_err(|e| content_err(e.to_string()))?;
    let mime = guess_mime(path);
    let modality = Modality::from_mime(&mime);

    let body = match modality {
        Modality::Image => String::new(),
        Modality::Text => {
            let bytes = std::fs::read(path).map_err(|e| content_err(e.to_string()))?;
            extract::extract_text(&bytes, &mime).map_err(|e| content_err(e.to_string()))?
        }
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let last_modified = fs_meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

    let mut metadata = Metadata::new();
    metadata.insert("file_name".into(), Value::String(file_name));
    metadata.insert("file_path".into(), Value::String(path.display().to_string()));
    metadata.insert("modality".into(), Value::String(modality.as_str().into()));
    metadata.insert("mime_type".into(), Value::String(mime));
    metadata.insert("file_size".into(), Value::from(fs_meta.len()));
    if let Some(ts) = last_modified {
        metadata.insert("last_modified".into(), Value::String(ts));
    }

    Ok(Document {
        path: path.to_path_buf(),
        modality,
        body,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(d: &Discovery, root: &Path) -> Vec<String> {
        d.files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_skips_hidden_and_default_excludes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("docs/b.md"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join(".hidden.txt"), "h").unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();

        let d = discover_files(&[root.to_path_buf()], &IngestConfig::default()).unwrap();
        assert_eq!(names(&d, root), vec!["a.txt", "docs/b.md"]);
    }

    #[test]
    fn test_exclude_globs_and_size_limit() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("keep.txt"), "small").unwrap();
        fs::write(root.join("drop.log"), "log").unwrap();
        fs::write(root.join("big.txt"), "x".repeat(64)).unwrap();

        let config = IngestConfig {
            exclude_globs: vec!["*.log".to_string()],
            max_file_bytes: 32,
            follow_symlinks: false,
        };
        let d = discover_files(&[root.to_path_buf()], &config).unwrap();
        assert_eq!(names(&d, root), vec!["keep.txt"]);
        assert_eq!(d.skipped.len(), 1);
        assert!(d.skipped[0].path.ends_with("big.txt"));
    }

    #[test]
    fn test_overlapping_roots_deduplicated() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/x.txt"), "x").unwrap();
        let d = discover_files(
            &[root.to_path_buf(), root.join("sub")],
            &IngestConfig::default(),
        )
        .unwrap();
        assert_eq!(d.files.len(), 1);
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let config = IngestConfig {
            exclude_globs: vec!["a[".to_string()],
            ..IngestConfig::default()
        };
        let err = discover_files(&[], &config).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn test_load_text_document_metadata() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.md");
        fs::write(&path, "# Title\nbody").unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.modality, Modality::Text);
        assert_eq!(doc.body, "# Title\nbody");
        assert_eq!(doc.metadata["file_name"], "notes.md");
        assert_eq!(doc.metadata["modality"], "text");
        assert_eq!(doc.metadata["file_size"], 12);
        assert!(doc.metadata.contains_key("last_modified"));
    }

    #[test]
    fn test_load_image_document_does_not_read_body() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.png");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.modality, Modality::Image);
        assert!(doc.body.is_empty());
        assert_eq!(doc.metadata["mime_type"], "image/png");
    }

    #[test]
    fn test_binary_text_file_is_content_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob.txt");
        fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();
        let err = load_document(&path).unwrap_err();
        assert!(err.is_content());
    }
}
