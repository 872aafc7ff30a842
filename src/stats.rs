//! Collection statistics.
//!
//! `lrag stats` ensures both collections exist and prints their sizes. The
//! dimensionalities come from the configured model names, so no embedding
//! model is loaded.

use anyhow::Result;
use serde::Serialize;

use crate::collections::CollectionManager;
use crate::config::{Config, StoreBackend};
use crate::embedding::{image_model_spec, text_model_spec};
use crate::store::create_store;

#[derive(Debug, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub model: String,
    pub dims: usize,
    pub entries: usize,
}

/// Gather per-collection stats from the configured backend.
pub async fn collect_stats(config: &Config) -> Result<Vec<CollectionStats>> {
    let text = text_model_spec(&config.embedding.text_model)?;
    let image = image_model_spec(&config.embedding.image_model)?;

    let store = create_store(config)?;
    let manager = CollectionManager::new(store, text.dims, image.dims);
    let collections = manager.ensure_collections().await?;

    let mut stats = Vec::with_capacity(2);
    for (handle, model) in [(&collections.text, text.name), (&collections.image, image.name)] {
        stats.push(CollectionStats {
            name: handle.name.clone(),
            model: model.to_string(),
            dims: handle.dims,
            entries: manager.store().count(handle).await?,
        });
    }
    Ok(stats)
}

/// Run the stats command and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let stats = collect_stats(config).await?;

    println!("Local RAG: Collection Stats");
    println!("===========================");
    println!();
    println!("  Backend:     {}", config.store.backend.as_str());
    match config.store.backend {
        StoreBackend::Local => {
            let size = std::fs::metadata(&config.store.path)
                .map(|m| m.len())
                .unwrap_or(0);
            println!("  Store:       {}", config.store.path.display());
            println!("  Size:        {}", format_bytes(size));
        }
        StoreBackend::Qdrant => println!("  Server:      {}", config.store.qdrant_url),
        StoreBackend::Memory => {}
    }
    println!();
    println!(
        "  {:<14} {:<24} {:>6} {:>10}",
        "COLLECTION", "MODEL", "DIMS", "ENTRIES"
    );
    println!("  {}", "-".repeat(57));
    for s in &stats {
        println!(
            "  {:<14} {:<24} {:>6} {:>10}",
            s.name, s.model, s.dims, s.entries
        );
    }
    println!();

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
