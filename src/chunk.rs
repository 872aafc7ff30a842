//! Fixed-size character-window chunker.
//!
//! Splits a text document into windows of at most `chunk_size` characters.
//! Consecutive windows share exactly `chunk_overlap` characters; only the
//! final window may be shorter. Sizes and offsets are counted in Unicode
//! scalar values, never bytes, so a window never splits a character.
//!
//! Chunk ids are `"{file_path}#{char_offset}"`, which makes re-ingesting an
//! unchanged file replace its entries instead of duplicating them.

use serde_json::Value;

use crate::models::{Chunk, Document};

/// Split `text` into `(char_offset, window)` pairs.
///
/// Returns nothing for empty or whitespace-only text. Callers guarantee
/// `chunk_overlap < chunk_size` (enforced by config validation); a bad pair
/// is clamped so the window always advances.
pub fn char_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, &str)> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);

    // Byte index of every char boundary, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = bounds.len();
    bounds.push(text.len());

    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(total_chars);
        windows.push((start, &text[bounds[start]..bounds[end]]));
        if end >= total_chars {
            break;
        }
        start += step;
    }
    windows
}

/// Chunk a text document. Each chunk inherits the document metadata plus
/// `chunk_index` and `char_offset`.
pub fn chunk_document(doc: &Document, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let file_path = doc.file_path();
    char_windows(&doc.body, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (char_offset, text))| {
            let mut metadata = doc.metadata.clone();
            metadata.insert("chunk_index".to_string(), Value::from(chunk_index));
            metadata.insert("char_offset".to_string(), Value::from(char_offset));
            Chunk {
                id: format!("{}#{}", file_path, char_offset),
                chunk_index,
                char_offset,
                text: text.to_string(),
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, Modality};
    use std::path::PathBuf;

    fn doc(body: &str) -> Document {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".into(), "notes.txt".into());
        Document {
            path: PathBuf::from("/data/notes.txt"),
            modality: Modality::Text,
            body: body.to_string(),
            metadata,
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_document(&doc("Hello, world!"), 1024, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].char_offset, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].id, "/data/notes.txt#0");
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        assert!(chunk_document(&doc(""), 1024, 200).is_empty());
        assert!(chunk_document(&doc("  \n\t \n"), 1024, 200).is_empty());
    }

    #[test]
    fn test_windows_overlap_exactly() {
        let text: String = ('a'..='z').cycle().take(25).collect();
        let windows = char_windows(&text, 10, 3);
        let offsets: Vec<usize> = windows.iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 7, 14, 21]);
        assert_eq!(windows[0].1.chars().count(), 10);
        assert_eq!(windows[2].1.chars().count(), 10);
        assert_eq!(windows[3].1.chars().count(), 4);
        assert_eq!(&windows[0].1[7..], &windows[1].1[..3]);
    }

    #[test]
    fn test_final_chunk_may_be_shorter() {
        let text = "x".repeat(2100);
        let windows = char_windows(&text, 1024, 200);
        let lens: Vec<usize> = windows.iter().map(|(_, w)| w.chars().count()).collect();
        assert_eq!(lens, vec![1024, 1024, 452]);
        assert_eq!(windows[2].0, 1648);
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let text = "é".repeat(15);
        let windows = char_windows(&text, 10, 2);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].1.chars().count(), 10);
        assert_eq!(windows[1].0, 8);
        assert_eq!(windows[1].1.chars().count(), 7);
    }

    #[test]
    fn test_metadata_inherited() {
        let text = "y".repeat(30);
        let chunks = chunk_document(&doc(&text), 20, 5);
        assert_eq!(chunks.len(), 2);
        let second = &chunks[1];
        assert_eq!(second.id, "/data/notes.txt#15");
        assert_eq!(second.metadata["file_name"], "notes.txt");
        assert_eq!(second.metadata["chunk_index"], 1);
        assert_eq!(second.metadata["char_offset"], 15);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta. ".repeat(100);
        let c1 = chunk_document(&doc(&text), 64, 16);
        let c2 = chunk_document(&doc(&text), 64, 16);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.text, b.text);
        }
    }
}
