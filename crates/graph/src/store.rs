//! Neo4j access behind a narrow trait.
//!
//! Every Cypher string sent through here either is a constant, or splices
//! only values validated against the closed schema (node labels from the
//! enum, relationship types checked by charset). Everything user- or
//! model-controlled travels as a bound parameter.

use std::collections::HashSet;

use neo4rs::{Graph, query};
use serde::Serialize;
use tracing::{debug, warn};

use extract::schema::{self, Entity, NodeLabel};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph store connection failed: {0}")]
    Connect(#[source] neo4rs::Error),
    #[error("graph query failed: {0}")]
    Query(#[from] neo4rs::Error),
    /// Refused before reaching the database: the type is not safe to splice.
    #[error("relationship type {0:?} is not in normalized form")]
    UnnormalizedType(String),
}

/// Seam between the pipeline and the graph database. Implemented by
/// [`GraphClient`] in production and by in-memory fakes in tests.
#[allow(async_fn_in_trait)]
pub trait GraphStore: Send + Sync {
    /// Locate-or-create the node keyed by the entity's derived id and
    /// overwrite its properties with the latest extraction.
    async fn upsert_entity(&self, entity: &Entity) -> Result<(), GraphError>;

    /// Which of the given ids are present as entity nodes right now.
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, GraphError>;

    /// Create one typed edge between two existing nodes. Returns the number
    /// of edges created; zero means an endpoint was not found.
    async fn create_relationship(
        &self,
        source_id: &str,
        rel_type: &str,
        target_id: &str,
        details: &str,
    ) -> Result<u64, GraphError>;

    /// Read path for generated queries. Each row is serialized to a JSON
    /// object keyed by its return columns.
    async fn run_read(&self, cypher: &str) -> Result<Vec<serde_json::Value>, GraphError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub entity_count: i64,
    pub relationship_count: i64,
    pub label_counts: Vec<LabelCount>,
}

#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, GraphError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(GraphError::Connect)?;
        Ok(Self { graph })
    }

    pub async fn ping(&self) -> Result<(), GraphError> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }

    /// Uniqueness on the derived id is what makes the node upsert a true
    /// locate-or-create; the name index serves the generated read queries.
    pub async fn init_schema(&self) -> Result<(), GraphError> {
        self.graph
            .run(query(
                "CREATE CONSTRAINT entity_id_unique IF NOT EXISTS \
                 FOR (e:Entity) REQUIRE e.id IS UNIQUE",
            ))
            .await?;
        self.graph
            .run(query(
                "CREATE INDEX entity_name_index IF NOT EXISTS \
                 FOR (e:Entity) ON (e.name)",
            ))
            .await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<GraphStats, GraphError> {
        let entity_count = self
            .count("MATCH (e:Entity) RETURN count(e) AS total")
            .await?;
        let relationship_count = self
            .count("MATCH (:Entity)-[r]->(:Entity) RETURN count(r) AS total")
            .await?;

        let mut label_counts = Vec::with_capacity(NodeLabel::ALL.len());
        for label in NodeLabel::ALL {
            let cypher = format!("MATCH (e:{label}) RETURN count(e) AS total", label = label.as_str());
            label_counts.push(LabelCount {
                label: label.as_str().to_string(),
                count: self.count(&cypher).await?,
            });
        }

        Ok(GraphStats {
            entity_count,
            relationship_count,
            label_counts,
        })
    }

    async fn count(&self, cypher: &str) -> Result<i64, GraphError> {
        let mut result = self.graph.execute(query(cypher)).await?;
        let mut total = 0;
        if let Some(row) = result.next().await? {
            total = row.get::<i64>("total").unwrap_or(0);
        }
        Ok(total)
    }
}

impl GraphStore for GraphClient {
    async fn upsert_entity(&self, entity: &Entity) -> Result<(), GraphError> {
        // Label comes from the closed enum, never from model output.
        let cypher = format!(
            "MERGE (e:Entity {{id: $id}}) \
             SET e.name = $name, e.context = $context, e.type = $type \
             SET e:{label}",
            label = entity.entity_type.as_str(),
        );
        self.graph
            .run(
                query(&cypher)
                    .param("id", entity.id())
                    .param("name", entity.name.clone())
                    .param("context", entity.context.clone())
                    .param("type", entity.entity_type.as_str().to_string()),
            )
            .await?;
        debug!(id = %entity.id(), label = %entity.entity_type, "upserted entity");
        Ok(())
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, GraphError> {
        let mut result = self
            .graph
            .execute(
                query("MATCH (e:Entity) WHERE e.id IN $ids RETURN e.id AS id")
                    .param("ids", ids.to_vec()),
            )
            .await?;
        let mut found = HashSet::new();
        while let Some(row) = result.next().await? {
            if let Ok(id) = row.get::<String>("id") {
                found.insert(id);
            }
        }
        Ok(found)
    }

    async fn create_relationship(
        &self,
        source_id: &str,
        rel_type: &str,
        target_id: &str,
        details: &str,
    ) -> Result<u64, GraphError> {
        if !schema::is_normalized_relationship_type(rel_type) {
            return Err(GraphError::UnnormalizedType(rel_type.to_string()));
        }
        // MATCH on both endpoints first: a missing endpoint creates nothing
        // instead of fabricating a placeholder node.
        let cypher = format!(
            "MATCH (source:Entity {{id: $source_id}}) \
             MATCH (target:Entity {{id: $target_id}}) \
             CREATE (source)-[rel:{rel_type} {{details: $details}}]->(target) \
             RETURN count(rel) AS total",
        );
        let mut result = self
            .graph
            .execute(
                query(&cypher)
                    .param("source_id", source_id.to_string())
                    .param("target_id", target_id.to_string())
                    .param("details", details.to_string()),
            )
            .await?;
        let mut created = 0;
        if let Some(row) = result.next().await? {
            created = row.get::<i64>("total").unwrap_or(0);
        }
        Ok(created.max(0) as u64)
    }

    async fn run_read(&self, cypher: &str) -> Result<Vec<serde_json::Value>, GraphError> {
        let mut result = self.graph.execute(query(cypher)).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            match row.to::<serde_json::Value>() {
                Ok(value) => rows.push(value),
                Err(e) => {
                    warn!(error = %e, "skipping row that does not serialize to JSON");
                }
            }
        }
        Ok(rows)
    }
}
