//! Ingest progress reporting.
//!
//! Progress goes to **stderr** so stdout stays parseable. The mode defaults to
//! human-readable lines when stderr is a terminal and to silence otherwise;
//! `--progress json` emits one JSON object per line for scripts.

use std::io::Write;
use std::path::PathBuf;

use crate::models::Modality;

/// A single progress event emitted by the ingestion pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestProgressEvent {
    /// Walking a root directory; totals unknown yet.
    Discovering { root: PathBuf },
    /// Documents loaded and classified.
    Loaded { text: u64, images: u64 },
    /// `n` of `total` items of one modality embedded.
    Embedding { modality: Modality, n: u64, total: u64 },
    /// Entries written to the modality's collection.
    Stored { modality: Modality, count: u64 },
}

pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly lines: `ingest  embedding image  3 / 12`.
pub struct StderrProgress;

impl StderrProgress {
    fn line(event: &IngestProgressEvent) -> String {
        match event {
            IngestProgressEvent::Discovering { root } => {
                format!("ingest  discovering {}...\n", root.display())
            }
            IngestProgressEvent::Loaded { text, images } => format!(
                "ingest  loaded {} text documents, {} images\n",
                format_number(*text),
                format_number(*images)
            ),
            IngestProgressEvent::Embedding { modality, n, total } => format!(
                "ingest  embedding {}  {} / {}\n",
                modality,
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Stored { modality, count } => {
                format!("ingest  stored {} {} entries\n", format_number(*count), modality)
            }
        }
    }
}

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(Self::line(&event).as_bytes());
        let _ = err.flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn value(event: &IngestProgressEvent) -> serde_json::Value {
        match event {
            IngestProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root.display().to_string(),
            }),
            IngestProgressEvent::Loaded { text, images } => serde_json::json!({
                "event": "progress",
                "phase": "loaded",
                "text": text,
                "images": images,
            }),
            IngestProgressEvent::Embedding { modality, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "modality": modality,
                "n": n,
                "total": total,
            }),
            IngestProgressEvent::Stored { modality, count } => serde_json::json!({
                "event": "progress",
                "phase": "stored",
                "modality": modality,
                "count": count,
            }),
        }
    }
}

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::value(&event)) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Progress mode for the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn human_line_for_embedding() {
        let line = StderrProgress::line(&IngestProgressEvent::Embedding {
            modality: Modality::Image,
            n: 3,
            total: 1200,
        });
        assert_eq!(line, "ingest  embedding image  3 / 1,200\n");
    }

    #[test]
    fn json_event_shape() {
        let v = JsonProgress::value(&IngestProgressEvent::Stored {
            modality: Modality::Text,
            count: 42,
        });
        assert_eq!(v["phase"], "stored");
        assert_eq!(v["modality"], "text");
        assert_eq!(v["count"], 42);
    }
}
