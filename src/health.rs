//! `lrag health`: reachability of the vector store and the language model.

use crate::config::Config;
use crate::error::Result;
use crate::llm::OpenAiCompatClient;
use crate::store::create_store;

fn report(component: &str, outcome: &Result<()>) -> bool {
    match outcome {
        Ok(()) => {
            println!("✓ {}: OK", component);
            true
        }
        Err(e) => {
            println!("✗ {}: {}", component, e);
            false
        }
    }
}

/// Probe both dependencies. Returns `true` only when both answer.
///
/// Pinging the `local` backend opens the SQLite file, creating it and its
/// parent directory when absent.
pub async fn run_health(config: &Config) -> anyhow::Result<bool> {
    println!("Checking system health...");
    println!();

    let store_outcome = match create_store(config) {
        Ok(store) => store.ping().await,
        Err(e) => Err(e),
    };
    let store_ok = report(
        &format!("Vector store ({})", config.store.backend.as_str()),
        &store_outcome,
    );

    let llm_outcome = match OpenAiCompatClient::new(config) {
        Ok(client) => client.check_models().await,
        Err(e) => Err(e),
    };
    let llm_ok = report(&format!("LLM ({})", config.llm.base_url), &llm_outcome);

    println!();
    if store_ok && llm_ok {
        println!("All systems operational!");
        Ok(true)
    } else {
        println!("Some systems are not available.");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    #[test]
    fn test_report_outcome() {
        assert!(report("Vector store (memory)", &Ok(())));
        assert!(!report("LLM", &Err(RagError::Llm("connection refused".into()))));
    }
}
