//! In-memory graph store
//!
//! Serves the fixture dataset without a database. Used for local
//! development and by tests.

use super::fixtures::FixtureDataset;
use super::{GraphSession, GraphStore, PropertyMap, RelationQuery, RelationRecord};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct College {
    properties: PropertyMap,
    /// (relation, object properties) in insertion order
    edges: Vec<(String, PropertyMap)>,
}

#[derive(Debug, Default)]
struct Graph {
    /// Keyed by lowercased name
    colleges: HashMap<String, College>,
}

/// Fixture-backed store
#[derive(Debug, Clone)]
pub struct MemoryGraphStore {
    graph: Arc<Graph>,
    open_sessions: Arc<AtomicUsize>,
    sessions_opened: Arc<AtomicUsize>,
    fail_relation: Option<&'static str>,
}

impl MemoryGraphStore {
    pub fn from_fixtures(data: &FixtureDataset) -> Self {
        let mut by_key: HashMap<&str, College> = HashMap::new();

        for node in &data.nodes {
            if node.label == super::COLLEGE_LABEL {
                by_key.insert(
                    node.key,
                    College {
                        properties: node.properties.clone(),
                        edges: Vec::new(),
                    },
                );
            }
        }

        for edge in &data.edges {
            let Some(target) = data.find(edge.to) else {
                continue;
            };
            if let Some(college) = by_key.get_mut(edge.from) {
                college
                    .edges
                    .push((edge.relation.to_string(), target.properties.clone()));
            }
        }

        let colleges = by_key
            .into_values()
            .filter_map(|college| {
                let name = college.properties.get("name")?.as_str()?.to_lowercase();
                Some((name, college))
            })
            .collect();

        Self {
            graph: Arc::new(Graph { colleges }),
            open_sessions: Arc::new(AtomicUsize::new(0)),
            sessions_opened: Arc::new(AtomicUsize::new(0)),
            fail_relation: None,
        }
    }

    /// Fail every traversal of `relation`
    pub fn failing_on(mut self, relation: &'static str) -> Self {
        self.fail_relation = Some(relation);
        self
    }

    /// Sessions opened and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions opened over the store's lifetime
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            store: self.clone(),
            open: true,
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct MemorySession {
    store: MemoryGraphStore,
    open: bool,
}

#[async_trait]
impl GraphSession for MemorySession {
    async fn traverse(&mut self, query: &RelationQuery) -> Result<Vec<RelationRecord>> {
        if !self.open {
            return Err(AppError::GraphStore {
                message: "Graph session is no longer open".to_string(),
                transient: false,
            });
        }
        if self.store.fail_relation == Some(query.relation) {
            return Err(AppError::GraphStore {
                message: format!("traversal of {} failed", query.relation),
                transient: false,
            });
        }

        let Some(college) = self.store.graph.colleges.get(&query.entity.to_lowercase()) else {
            return Ok(Vec::new());
        };

        Ok(college
            .edges
            .iter()
            .filter(|(relation, _)| relation == query.relation)
            .map(|(relation, object)| RelationRecord {
                relation_type: relation.clone(),
                subject: college.properties.clone(),
                object: object.clone(),
            })
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.open, false) {
            self.store.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
