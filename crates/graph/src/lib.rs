//! Graph persistence: the Neo4j-backed store and the upsert engine that
//! lands extraction results in it.

pub mod store;
pub mod upsert;

pub use store::{GraphClient, GraphError, GraphStats, GraphStore, LabelCount};
pub use upsert::{UpsertEngine, UpsertError, UpsertSummary};
