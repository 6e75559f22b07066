//! Turns raw investigation text into a schema-conforming [`ExtractionResult`].
//!
//! The model output is deserialized strictly against the closed schema.
//! Malformed JSON and unknown labels earn exactly one corrective round trip;
//! a second failure or a blank name or context rejects the whole document
//! rather than persisting a partial or coerced graph.

pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod retry;
pub mod schema;

use tracing::{info, warn};

pub use llm::{CompletionClient, Completions, LlmError};
pub use normalizer::{entity_id, normalize};
pub use retry::RetryPolicy;
pub use schema::{Entity, ExtractionResult, NodeLabel, Relationship};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("completion service failed: {0}")]
    Completion(#[from] LlmError),
    /// The model output never conformed to the schema, even after the
    /// corrective retry.
    #[error("extraction output rejected: {0}")]
    Conformance(String),
}

pub struct Extractor<C> {
    completions: C,
}

impl<C: Completions> Extractor<C> {
    pub fn new(completions: C) -> Self {
        Self { completions }
    }

    /// Extract the knowledge graph from one document. `source_doc` is the
    /// human-readable label of the originating document and is packaged into
    /// the prompt alongside the text.
    pub async fn extract(
        &self,
        text: &str,
        source_doc: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let system = prompt::extraction_system_prompt();
        let user = prompt::extraction_user_content(source_doc, text);
        let raw = self.completions.complete_json(&system, &user).await?;

        let result = match parse(&raw) {
            Ok(result) => result,
            Err(reason) => {
                warn!(source_doc, %reason, "extraction output rejected, retrying once");
                let corrective = prompt::corrective_prompt(&raw, &reason);
                let retried = self.completions.complete_json(&system, &corrective).await?;
                parse(&retried).map_err(|e| {
                    ExtractError::Conformance(format!("still malformed after corrective retry: {e}"))
                })?
            }
        };

        validate(&result)?;
        info!(
            source_doc,
            nodes = result.nodes.len(),
            relationships = result.relationships.len(),
            "extraction completed",
        );
        Ok(result)
    }
}

fn parse(raw: &str) -> Result<ExtractionResult, String> {
    serde_json::from_str(raw).map_err(|e| e.to_string())
}

/// Schema conformance beyond what serde can express: names and contexts must
/// be non-blank on every entity, including relationship endpoints.
fn validate(result: &ExtractionResult) -> Result<(), ExtractError> {
    let endpoints = result
        .relationships
        .iter()
        .flat_map(|rel| [&rel.source, &rel.target]);
    for entity in result.nodes.iter().chain(endpoints) {
        if entity.name.trim().is_empty() {
            return Err(ExtractError::Conformance(
                "entity with a blank name".to_string(),
            ));
        }
        if entity.context.trim().is_empty() {
            return Err(ExtractError::Conformance(format!(
                "entity {:?} has a blank context",
                entity.name
            )));
        }
    }
    Ok(())
}
