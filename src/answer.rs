//! Answer synthesis and the `query` / `chat` commands.
//!
//! Each question is answered independently: retrieve, build the grounding
//! context, ask the language model once. The chat loop keeps no history
//! between turns.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::Result;
use crate::llm::{Completion, OpenAiCompatClient};
use crate::models::QueryResponse;
use crate::retrieve::{build_context, RetrievalEngine};
use crate::store::{create_store, VectorStore};

/// Render the prompt sent to the language model.
pub fn format_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}\n\
         Answer: ",
        context, question
    )
}

pub struct AnswerSynthesizer {
    retrieval: RetrievalEngine,
    completion: Arc<dyn Completion>,
}

impl AnswerSynthesizer {
    pub fn new(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self {
            retrieval: RetrievalEngine::new(config, store, embedder),
            completion,
        }
    }

    /// Retrieve, prompt, complete. Empty collections still reach the model
    /// with an empty context.
    pub async fn answer(&self, question: &str) -> Result<QueryResponse> {
        let chunks = self.retrieval.retrieve(question).await?;
        let context = build_context(&chunks, self.retrieval.config().max_context_chars);
        let prompt = format_prompt(&context, question);

        let answer = self.completion.complete(&prompt).await?;
        info!(sources = chunks.len(), "answered");

        Ok(QueryResponse {
            question: question.to_string(),
            answer: answer.trim().to_string(),
            sources: chunks.into_iter().map(|c| c.source).collect(),
        })
    }
}

fn build_synthesizer(config: &Config) -> Result<AnswerSynthesizer> {
    let store = create_store(config)?;
    let embedder = create_embedder(&config.embedding)?;
    let completion = Arc::new(OpenAiCompatClient::new(config)?);
    Ok(AnswerSynthesizer::new(config, store, embedder, completion))
}

fn print_response(response: &QueryResponse) {
    println!("Answer:");
    println!("{}", response.answer);
    if response.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, source) in response.sources.iter().enumerate() {
        println!(
            "{}. {} [{}] (score: {:.4})",
            i + 1,
            source.file_name,
            source.modality,
            source.score
        );
        println!("    {}", source.file_path);
        if !source.excerpt.is_empty() {
            println!("    {}", source.excerpt.replace('\n', " "));
        }
    }
}

/// Run the `query` command.
pub async fn run_query(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(k) = top_k {
        config.retrieval.top_k = k;
    }
    let synthesizer = build_synthesizer(&config)?;
    let response = synthesizer
        .answer(question)
        .await
        .context("Query failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

/// What the chat loop should do with one line of input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Skip,
    Exit,
    Help,
    Question(&'a str),
}

fn classify(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Skip;
    }
    match trimmed.to_lowercase().as_str() {
        "exit" | "quit" => ChatInput::Exit,
        "help" => ChatInput::Help,
        _ => ChatInput::Question(trimmed),
    }
}

/// Run the interactive `chat` loop until `exit`, EOF or Ctrl-C.
pub async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let synthesizer = build_synthesizer(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Local RAG CLI Chat");
    println!("Type 'exit' to quit, 'help' for commands");

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nGoodbye!");
                return Ok(());
            }
        };
        let Some(line) = line else {
            println!("\nGoodbye!");
            return Ok(());
        };

        match classify(&line) {
            ChatInput::Skip => continue,
            ChatInput::Exit => {
                println!("Goodbye!");
                return Ok(());
            }
            ChatInput::Help => {
                println!("Commands:");
                println!("  exit/quit - Exit the chat");
                println!("  help - Show this help message");
            }
            ChatInput::Question(question) => match synthesizer.answer(question).await {
                Ok(response) => {
                    println!("\nAssistant: {}", response.answer);
                    for source in &response.sources {
                        println!("  - {} (score: {:.4})", source.file_name, source.score);
                    }
                }
                Err(e) => println!("Error: {}", e),
            },
        }
    }
}
