//! Shared graph schema: the closed label set, the canonical relationship
//! vocabulary, and the JSON contract the extraction model must honor.
//!
//! The extraction prompt and the retrieval prompts both render their schema
//! sections from these definitions, so the two sides cannot drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalizer;

/// Closed set of node labels. Anything else coming back from the model is a
/// deserialization failure, not a new label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Person,
    Company,
    Address,
    Document,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 4] = [
        NodeLabel::Person,
        NodeLabel::Company,
        NodeLabel::Address,
        NodeLabel::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Person => "Person",
            NodeLabel::Company => "Company",
            NodeLabel::Address => "Address",
            NodeLabel::Document => "Document",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical relationship vocabulary. The model is steered toward these but
/// may coin additional UPPER_SNAKE_CASE types when none of them fits.
pub const RELATIONSHIP_TYPES: [&str; 8] = [
    "RESIDES_AT",
    "SPOUSE",
    "PERSONAL_SECRETARY_FOR",
    "LOCATED_AT",
    "USES_EMAIL",
    "DIRECTOR_OF",
    "REGISTERED_AT",
    "TRANSFERRED_TO",
];

/// Property keys carried by every persisted entity node.
pub const PROPERTY_KEYS: [&str; 4] = ["id", "name", "type", "context"];

/// An extracted entity. `context` is mandatory and feeds the derived id, so
/// two people sharing a name stay distinct in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: NodeLabel,
    pub context: String,
}

impl Entity {
    /// Graph-wide identity: `normalize(name) + "_" + normalize(context)`.
    pub fn id(&self) -> String {
        normalizer::entity_id(&self.name, &self.context)
    }
}

/// A directed edge between two extracted entities. Endpoints are embedded in
/// full so the edge can re-derive their ids without a lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: Entity,
    pub target: Entity,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// One model pass over one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub nodes: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

/// The model produced a relationship type with no alphanumeric content, so
/// no UPPER_SNAKE_CASE name can be built from it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("relationship type {raw:?} does not normalize to UPPER_SNAKE_CASE")]
pub struct InvalidRelationshipType {
    pub raw: String,
}

/// Collapse every non-alphanumeric run to an underscore the same way entity
/// ids are built, then uppercase. The result must be plain `[A-Z0-9_]+`.
/// Only normalized types may ever be spliced into Cypher, since relationship
/// types cannot be parameterized.
pub fn normalize_relationship_type(raw: &str) -> Result<String, InvalidRelationshipType> {
    let normalized = normalizer::normalize(raw).to_uppercase();
    if !is_normalized_relationship_type(&normalized) {
        return Err(InvalidRelationshipType {
            raw: raw.to_string(),
        });
    }
    Ok(normalized)
}

pub fn is_normalized_relationship_type(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
