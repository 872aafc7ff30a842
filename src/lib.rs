//! # Local RAG
//!
//! A local-first retrieval-augmented generation tool for documents and images.
//!
//! Files under one or more directories are classified as text or image,
//! text is split into overlapping character windows, and everything is
//! embedded by local models into two collections of a pluggable vector store.
//! Questions are embedded the same way, matched against both collections,
//! and answered by a locally hosted OpenAI-compatible language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ Directories │──▶│  Ingestion   │──▶│   VectorStore    │
//! │ text/images │   │ chunk+embed  │   │ local/qdrant/mem │
//! └─────────────┘   └──────────────┘   └────────┬─────────┘
//!                                               │
//!                   ┌──────────────┐   ┌────────▼─────────┐
//!                   │  Local LLM   │◀──│    Retrieval     │
//!                   │ /chat/compl. │   │  merge + dedup   │
//!                   └──────────────┘   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lrag health                       # store + LLM reachable?
//! lrag ingest ./docs ./photos       # index text and images
//! lrag query "what changed in Q3?"  # one-shot answer with sources
//! lrag chat                         # interactive loop
//! lrag stats                        # collection sizes
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Core data types |
//! | [`discover`] | Directory walking and document loading |
//! | [`extract`] | PDF / DOCX / PPTX text extraction |
//! | [`chunk`] | Character-window chunking |
//! | [`embedding`] | Text and image embedding |
//! | [`store`] | Vector-store backends |
//! | [`collections`] | `rag_text` / `rag_images` lifecycle |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieve`] | Retrieval, deduplication, context |
//! | [`llm`] | OpenAI-compatible completion client |
//! | [`answer`] | Answer synthesis, `query` and `chat` |

pub mod answer;
pub mod chunk;
pub mod collections;
pub mod config;
pub mod discover;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod health;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod progress;
pub mod retrieve;
pub mod stats;
pub mod store;
