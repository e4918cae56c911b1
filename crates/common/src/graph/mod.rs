//! Graph store layer for CampusCandid
//!
//! Provides:
//! - Session-scoped graph store abstraction
//! - Parametrized relation traversal queries
//! - Neo4j (HTTP transactional endpoint) and in-memory implementations
//! - The college fixture dataset

pub mod fixtures;
mod memory;
mod neo4j;

pub use memory::MemoryGraphStore;
pub use neo4j::Neo4jStore;

use crate::config::{GraphBackend, GraphConfig};
use crate::errors::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

/// Properties of a node or relationship
pub type PropertyMap = Map<String, Value>;

/// Relationship types connecting a college to its facts
pub mod relations {
    pub const HAS_PLACEMENT: &str = "HAS_PLACEMENT";
    pub const OFFERS_COURSE: &str = "OFFERS_COURSE";
    pub const HAS_FACULTY: &str = "HAS_FACULTY";
    pub const HAS_INFRASTRUCTURE: &str = "HAS_INFRASTRUCTURE";
    pub const HOSTS_EVENT: &str = "HOSTS_EVENT";
}

/// Label of college nodes
pub const COLLEGE_LABEL: &str = "College";

/// A statement with named parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CypherStatement {
    pub statement: String,
    pub parameters: PropertyMap,
}

impl CypherStatement {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Map::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }
}

/// "Traverse `relation` from the college named `entity`"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationQuery {
    pub entity: String,
    pub relation: &'static str,
}

impl RelationQuery {
    pub fn new(entity: impl Into<String>, relation: &'static str) -> Self {
        Self {
            entity: entity.into(),
            relation,
        }
    }

    /// Exact, case-insensitive name match followed by one typed hop
    ///
    /// The relationship type comes from the closed relation table and is
    /// the only interpolated part; the name is always a bound parameter.
    pub fn to_cypher(&self) -> CypherStatement {
        CypherStatement::new(format!(
            "MATCH (c:{label})-[r:{relation}]->(info) \
             WHERE toLower(c.name) = toLower($name) \
             RETURN properties(c) AS subject, type(r) AS relation, properties(info) AS object",
            label = COLLEGE_LABEL,
            relation = self.relation,
        ))
        .param("name", self.entity.as_str())
    }
}

/// One traversed edge with both endpoints' properties
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationRecord {
    pub relation_type: String,
    pub subject: PropertyMap,
    pub object: PropertyMap,
}

/// A scoped unit of work against the store
///
/// Callers must `close` the session on every path, including errors.
#[async_trait]
pub trait GraphSession: Send {
    /// Run one relation traversal
    async fn traverse(&mut self, query: &RelationQuery) -> Result<Vec<RelationRecord>>;

    /// Release the session; later calls fail
    async fn close(&mut self) -> Result<()>;
}

/// Trait for graph stores
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Acquire a session for one request
    async fn open_session(&self) -> Result<Box<dyn GraphSession>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs and readiness output
    fn backend(&self) -> &'static str;
}

/// Create a graph store based on configuration
pub fn create_store(config: &GraphConfig) -> Result<Arc<dyn GraphStore>> {
    match config.backend {
        GraphBackend::Neo4j => {
            info!(url = %config.url, database = %config.database, "Using Neo4j graph store");
            Ok(Arc::new(Neo4jStore::new(config)?))
        }
        GraphBackend::Memory => {
            info!("Using in-memory graph store with the fixture dataset");
            Ok(Arc::new(MemoryGraphStore::from_fixtures(
                &fixtures::college_dataset(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_query_binds_name() {
        let query = RelationQuery::new("PES University", relations::HAS_PLACEMENT);
        let cypher = query.to_cypher();

        assert!(cypher.statement.contains("[r:HAS_PLACEMENT]"));
        assert!(cypher.statement.contains("toLower(c.name) = toLower($name)"));
        assert!(!cypher.statement.contains("PES University"));
        assert_eq!(cypher.parameters["name"], "PES University");
    }

    #[test]
    fn test_name_is_never_interpolated() {
        let query = RelationQuery::new("x' OR 1=1 //", relations::HOSTS_EVENT);
        let cypher = query.to_cypher();

        assert!(!cypher.statement.contains("1=1"));
        assert_eq!(cypher.parameters["name"], "x' OR 1=1 //");
    }

    #[test]
    fn test_memory_backend_from_config() {
        let config = GraphConfig {
            backend: GraphBackend::Memory,
            ..GraphConfig::default()
        };
        let store = create_store(&config).unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
