//! Prompt assembly for graph extraction.
//!
//! The schema section is rendered from [`crate::schema`] constants rather
//! than hand-written, so prompt and parser always agree on labels and
//! vocabulary.

use crate::schema::{NodeLabel, RELATIONSHIP_TYPES};

pub(crate) fn label_list() -> String {
    NodeLabel::ALL
        .iter()
        .map(|label| label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn relationship_list() -> String {
    RELATIONSHIP_TYPES.join(", ")
}

/// System prompt for the extraction pass. Asks for exactly one JSON object
/// matching [`crate::schema::ExtractionResult`].
pub fn extraction_system_prompt() -> String {
    format!(
        r#"You are an elite forensic investigator analyzing documents for fraud, corruption, and money laundering. Read the document and extract a knowledge graph as a single JSON object.

JSON STRUCTURE (exactly this shape):
{{
  "nodes": [
    {{"name": "Budi Santoso", "type": "Person", "context": "Direktur PT Maju Jaya"}}
  ],
  "relationships": [
    {{"source": {{"name": "...", "type": "...", "context": "..."}}, "target": {{"name": "...", "type": "...", "context": "..."}}, "type": "DIRECTOR_OF", "details": "supporting facts, amounts, dates"}}
  ]
}}

CORE RULES:
1. Entity resolution: every entity MUST carry a non-empty "context" describing its role or affiliation, so two people who share a name stay distinct.
   - Wrong: {{"name": "Agus", "context": ""}}
   - Right: {{"name": "Agus", "context": "Direktur PT X"}}
2. Conflict of interest: actively hunt for family ties (spouse, sibling, child) and hidden share ownership between officials and vendors.
3. Addresses matter: when an official and a vendor touch the same address, extract that address as its own node and connect both parties to it.

ADVANCED RULES:
1. Digital footprint: a shared email, phone number, or address between two distinct entities IS evidence of a link. Extract the shared attribute as a node and connect both parties to it, for example with USES_EMAIL. This often exposes hidden beneficial owners.
2. Financial flow: record transfer amounts and dates in the relationship "details" and use TRANSFERRED_TO for the flow of money.
3. Shell companies: a company registered in a tax haven (BVI, Panama, Cayman) gets "Shell company" in its context.

OUTPUT RULES:
- "type" on nodes must be one of: {labels}.
- Prefer these relationship types: {relationships}. Coin a new UPPER_SNAKE_CASE type only when none of them fits.
- Respond with ONLY the JSON object. No markdown fences, no commentary."#,
        labels = label_list(),
        relationships = relationship_list(),
    )
}

/// User turn for the extraction pass: the source label plus the raw text.
pub fn extraction_user_content(source_doc: &str, text: &str) -> String {
    format!("Source document: {source_doc}\n\nText:\n{text}")
}

/// One corrective round trip after a response that failed to deserialize.
pub fn corrective_prompt(rejected: &str, reason: &str) -> String {
    format!(
        "Your previous response was rejected: {reason}.\n\nRejected response:\n{rejected}\n\nReturn the corrected result as a single JSON object in exactly the required structure. No markdown fences, no commentary."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_section_is_rendered_from_shared_definitions() {
        let prompt = extraction_system_prompt();
        assert!(prompt.contains("Person, Company, Address, Document"));
        assert!(prompt.contains("RESIDES_AT"));
        assert!(prompt.contains("TRANSFERRED_TO"));
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn user_content_carries_source_label() {
        let content = extraction_user_content("Case File #7", "some text");
        assert!(content.starts_with("Source document: Case File #7"));
        assert!(content.ends_with("some text"));
    }
}
