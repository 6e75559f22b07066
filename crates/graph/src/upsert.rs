//! Two-phase persistence of an extraction result.
//!
//! Phase one upserts every node keyed by derived id. Phase two verifies that
//! every relationship endpoint exists and only then creates the edges. A
//! relationship pointing at an id the graph does not hold fails the batch
//! visibly; nothing is fabricated to make it fit.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use extract::schema::{self, ExtractionResult};

use crate::store::{GraphError, GraphStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub nodes_written: usize,
    pub relationships_written: usize,
}

impl UpsertSummary {
    pub fn is_empty(&self) -> bool {
        self.nodes_written == 0 && self.relationships_written == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    /// Caught during preparation; the store was never touched.
    #[error("relationship type {raw:?} cannot be normalized; nothing was written")]
    InvalidRelationshipType { raw: String },
    #[error("node upsert failed after {nodes_written} of {nodes_total} nodes: {source}")]
    NodePhase {
        nodes_written: usize,
        nodes_total: usize,
        #[source]
        source: GraphError,
    },
    #[error("relationship phase failed with {nodes_written} nodes already persisted: {source}")]
    RelationshipPhase {
        nodes_written: usize,
        #[source]
        source: GraphError,
    },
    #[error(
        "relationships reference entity ids missing from the graph [{}] ({} nodes already persisted)",
        .missing.join(", "),
        .nodes_written
    )]
    MissingEndpoints {
        nodes_written: usize,
        missing: Vec<String>,
    },
}

struct PreparedRelationship {
    source_id: String,
    target_id: String,
    rel_type: String,
    details: String,
}

pub struct UpsertEngine<G> {
    store: G,
}

impl<G: GraphStore> UpsertEngine<G> {
    pub fn new(store: G) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, extraction: &ExtractionResult) -> Result<UpsertSummary, UpsertError> {
        if extraction.is_empty() {
            info!("extraction is empty, skipping graph writes");
            return Ok(UpsertSummary::default());
        }

        // Normalize every relationship type before the first write so a bad
        // type cannot leave a half-persisted batch behind.
        let mut prepared = Vec::with_capacity(extraction.relationships.len());
        for rel in &extraction.relationships {
            let rel_type = schema::normalize_relationship_type(&rel.rel_type)
                .map_err(|e| UpsertError::InvalidRelationshipType { raw: e.raw })?;
            prepared.push(PreparedRelationship {
                source_id: rel.source.id(),
                target_id: rel.target.id(),
                rel_type,
                details: rel.details.clone().unwrap_or_default(),
            });
        }

        let mut nodes_written = 0;
        for entity in &extraction.nodes {
            self.store
                .upsert_entity(entity)
                .await
                .map_err(|source| UpsertError::NodePhase {
                    nodes_written,
                    nodes_total: extraction.nodes.len(),
                    source,
                })?;
            nodes_written += 1;
        }

        if prepared.is_empty() {
            info!(nodes_written, "persisted extraction without relationships");
            return Ok(UpsertSummary {
                nodes_written,
                relationships_written: 0,
            });
        }

        let endpoint_ids: Vec<String> = prepared
            .iter()
            .flat_map(|rel| [rel.source_id.clone(), rel.target_id.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let existing = self
            .store
            .existing_ids(&endpoint_ids)
            .await
            .map_err(|source| UpsertError::RelationshipPhase {
                nodes_written,
                source,
            })?;
        let missing: Vec<String> = endpoint_ids
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(UpsertError::MissingEndpoints {
                nodes_written,
                missing,
            });
        }

        let mut relationships_written = 0;
        for rel in &prepared {
            let created = self
                .store
                .create_relationship(&rel.source_id, &rel.rel_type, &rel.target_id, &rel.details)
                .await
                .map_err(|source| UpsertError::RelationshipPhase {
                    nodes_written,
                    source,
                })?;
            if created == 0 {
                // Endpoint disappeared between the presence check and the
                // create; surface both ids rather than guessing which.
                return Err(UpsertError::MissingEndpoints {
                    nodes_written,
                    missing: vec![rel.source_id.clone(), rel.target_id.clone()],
                });
            }
            relationships_written += created as usize;
        }

        info!(nodes_written, relationships_written, "persisted extraction");
        Ok(UpsertSummary {
            nodes_written,
            relationships_written,
        })
    }
}
