//! Seeds the bundled money-laundering case into the graph and answers one
//! question end to end. Useful as a smoke run against live services:
//!
//!   cargo run --bin investigate -- "who is connected to John Doe?"

use std::time::Duration;

use anyhow::{Context, Result};

use api::config::Settings;
use extract::{CompletionClient, Extractor, RetryPolicy};
use graph::{GraphClient, UpsertEngine};
use query::{Outcome, Retriever, RetrieverConfig};

const CASE_SOURCE: &str = "Case File #99";

const CASE_TEXT: &str = "\
Further investigation into the ownership structure reveals that Mr. Hartono \
is the husband of Mrs. Linda Wijaya. According to the company registration \
database, Mrs. Linda Wijaya serves as Director of CV. Cahaya Makmur, a main \
vendor of PT. Sumber Rejeki Abadi.

Surprisingly, CV. Cahaya Makmur lists its office address as Jl. Jenderal \
Sudirman No. 88, which verification shows to be the same location as the \
headquarters of PT. Sumber Rejeki Abadi.

In addition, an audit document coded 'DOC-2024-X' surfaced, showing a \
transfer instruction from CV. Cahaya Makmur to the personal account of \
Mr. John Doe one month before Blue Ocean Holdings was founded.

Finally, digital traces show that Mr. John Doe previously worked as the \
personal secretary of Mrs. Linda Wijaya for five years, before relocating \
to the British Virgin Islands to manage that foreign entity.";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;
    api::init_tracing(&settings.log_level);

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "give me all relations of John Doe".to_string());

    let graph = GraphClient::connect(
        &settings.graph.uri,
        &settings.graph.user,
        &settings.graph.password,
    )
    .await
    .context("failed to connect to the graph store")?;
    graph.init_schema().await?;

    let retry = RetryPolicy::new(
        settings.llm.max_retries,
        settings.llm.initial_backoff_ms,
        settings.llm.max_backoff_ms,
    );
    let completions = CompletionClient::new(
        settings.llm.base_url.clone(),
        settings.llm.model.clone(),
        settings.llm.api_key.clone(),
        Duration::from_secs(settings.llm.timeout_secs),
        retry,
    )
    .context("failed to build the completion client")?;

    println!("Extracting {CASE_SOURCE}...");
    let extractor = Extractor::new(completions.clone());
    let extraction = extractor.extract(CASE_TEXT, CASE_SOURCE).await?;

    println!("\n--- Entities ---");
    for node in &extraction.nodes {
        println!("- {} ({}) -> {}", node.name, node.entity_type, node.context);
    }
    println!("\n--- Relationships ---");
    for rel in &extraction.relationships {
        println!("- {} --[{}]--> {}", rel.source.name, rel.rel_type, rel.target.name);
        if let Some(details) = &rel.details {
            println!("    details: {details}");
        }
    }

    let engine = UpsertEngine::new(graph.clone());
    let summary = engine.upsert(&extraction).await?;
    println!(
        "\nPersisted {} nodes and {} relationships.",
        summary.nodes_written, summary.relationships_written
    );

    let retriever = Retriever::new(
        completions,
        graph,
        RetrieverConfig {
            rewrite_on_empty: settings.retriever.rewrite_on_empty,
            max_query_rewrites: settings.retriever.max_query_rewrites,
        },
    );
    println!("\nQuestion: {question}");
    let retrieval = retriever.answer_question(&question).await?;
    if let Some(cypher) = &retrieval.state.cypher_query {
        println!("Generated query: {cypher}");
    }
    if retrieval.outcome == Outcome::CouldNotAnswer {
        println!("(no usable graph context after {} rewrites)", retrieval.rewrites);
    }
    println!("\nAnswer: {}", retrieval.answer_text());
    Ok(())
}
