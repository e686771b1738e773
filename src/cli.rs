use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde::Deserialize;

use crate::client::{AIClient, EmbeddingProvider};
use crate::config::Config;
use crate::store::{Document, InMemoryVectorStore};
use crate::workflow::Workflow;

#[derive(Debug, Parser)]
#[command(name = "deskpilot", version, about = "Process a support request through the agent pipeline")]
pub struct Cli {
    /// The support request to process
    pub request: String,

    /// JSON file with knowledge documents ([{"id", "title", "content"}, ...])
    /// to embed into the in-memory store before processing. Defaults to a
    /// small built-in demo corpus.
    #[arg(long)]
    pub kb: Option<PathBuf>,

    /// Print the full execution trace as JSON
    #[arg(long)]
    pub trace: bool,
}

#[derive(Debug, Deserialize)]
struct KbDocument {
    id: String,
    title: String,
    content: String,
}

/// Built-in corpus used when no knowledge file is supplied, so the demo
/// answers something grounded out of the box.
const DEMO_CORPUS: &[(&str, &str, &str)] = &[
    (
        "kb-001",
        "Password Reset Guide",
        "To reset your password, go to the login page and click 'Forgot Password'. \
         Enter your email address and follow the link we send you. Reset links \
         expire after 24 hours.",
    ),
    (
        "kb-002",
        "Billing FAQ",
        "Subscriptions are billed monthly or annually. To change your plan or \
         request a refund, open Account Settings and select Billing. Refunds for \
         annual plans are prorated.",
    ),
    (
        "kb-003",
        "Account Access Issues",
        "If you cannot log in, first clear your browser cache and cookies. \
         Accounts are locked for 30 minutes after five failed attempts. Contact \
         support if the lock does not clear.",
    ),
];

async fn seed_store(
    embeddings: &dyn EmbeddingProvider,
    store: &InMemoryVectorStore,
    documents: Vec<KbDocument>,
) -> Result<()> {
    let texts: Vec<String> = documents.iter().map(|doc| doc.content.clone()).collect();
    let vectors = embeddings.embed(&texts).await?;

    let docs = documents
        .into_iter()
        .zip(vectors)
        .map(|(doc, embedding)| Document {
            id: doc.id,
            title: doc.title,
            content: doc.content,
            embedding,
        })
        .collect();

    store.add(docs).await
}

fn load_kb_file(path: &PathBuf) -> Result<Vec<KbDocument>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse knowledge file {}", path.display()))
}

fn demo_corpus() -> Vec<KbDocument> {
    DEMO_CORPUS
        .iter()
        .map(|(id, title, content)| KbDocument {
            id: (*id).to_string(),
            title: (*title).to_string(),
            content: (*content).to_string(),
        })
        .collect()
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let client = Arc::new(AIClient::new(&config.llm)?);
    let store = Arc::new(InMemoryVectorStore::new());

    let documents = match &cli.kb {
        Some(path) => load_kb_file(path)?,
        None => demo_corpus(),
    };
    seed_store(client.as_ref(), store.as_ref(), documents).await?;
    println!(
        "{} seeded {} knowledge document(s)",
        "✓".green(),
        store.len().await
    );

    let workflow = Workflow::new(client.clone(), client.clone(), store, &config);
    let response = workflow.process(&cli.request).await?;

    println!("\n{}", "Answer".bold());
    println!("{}\n", response.answer);

    if response.sources.is_empty() {
        println!("{}", "No knowledge sources matched this request.".dimmed());
    } else {
        println!("{}", "Sources".bold());
        for source in &response.sources {
            println!(
                "  {} {} ({:.2})",
                "-".dimmed(),
                source.title,
                source.similarity_score
            );
        }
    }

    println!(
        "\n{} {} ms, ~{} tokens",
        "Metrics:".bold(),
        response.metrics.latency_ms,
        response.metrics.token_usage
    );

    if cli.trace {
        println!("\n{}", "Trace".bold());
        println!("{}", serde_json::to_string_pretty(&response.trace)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_corpus_has_unique_ids() {
        let docs = demo_corpus();
        assert!(!docs.is_empty());
        let mut ids: Vec<&str> = DEMO_CORPUS.iter().map(|(id, _, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), docs.len());
    }

    #[test]
    fn kb_file_format_parses() {
        let raw = r#"[{"id": "kb-1", "title": "Guide", "content": "Reset your password."}]"#;
        let docs: Vec<KbDocument> = serde_json::from_str(raw).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "kb-1");
    }
}
