//! Graph Query Engine - one traversal per (entity, intent) pair
//!
//! Traversals run sequentially inside a single graph session, entity-major
//! then intent order, so the evidence order matches resolution order.

use super::lexicon::Intent;
use super::resolved::ResolvedQuery;
use crate::config::RetryConfig;
use crate::errors::Result;
use crate::graph::{GraphSession, GraphStore, RelationQuery, RelationRecord};
use crate::metrics;
use crate::retry::with_retry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Records retrieved for one (entity, intent) pair
///
/// An empty list means "no data found" and is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    pub entity: String,
    pub intent: Intent,
    pub records: Vec<RelationRecord>,
}

/// Evidence for one turn, in entity-then-intent order
pub type Evidence = Vec<EvidenceItem>;

/// Run every traversal for a resolved turn on an open session
pub async fn traverse_all(session: &mut dyn GraphSession, resolved: &ResolvedQuery) -> Result<Evidence> {
    let mut evidence = Vec::new();

    for entity in resolved.entities.iter() {
        for intent in resolved.intents.iter().copied() {
            let Some(relation) = intent.relation() else {
                continue;
            };

            let start = Instant::now();
            let records = session.traverse(&RelationQuery::new(entity.as_str(), relation)).await?;
            metrics::record_traversal(start.elapsed().as_secs_f64(), relation, records.len());

            debug!(entity = %entity, relation, records = records.len(), "Traversed relation");
            evidence.push(EvidenceItem {
                entity: entity.clone(),
                intent,
                records,
            });
        }
    }

    Ok(evidence)
}

/// Session-scoped retrieval against a graph store
pub struct GraphQueryEngine {
    store: Arc<dyn GraphStore>,
    retry: RetryConfig,
}

impl GraphQueryEngine {
    pub fn new(store: Arc<dyn GraphStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Retrieve evidence for a turn
    ///
    /// Each attempt opens its own session and closes it before returning,
    /// whether or not the traversals succeeded.
    #[instrument(skip(self, resolved), fields(backend = self.store.backend()))]
    pub async fn retrieve(&self, resolved: &ResolvedQuery) -> Result<Evidence> {
        with_retry(&self.retry, "graph.retrieve", || self.retrieve_once(resolved)).await
    }

    async fn retrieve_once(&self, resolved: &ResolvedQuery) -> Result<Evidence> {
        let mut session = self.store.open_session().await?;
        let result = traverse_all(session.as_mut(), resolved).await;

        let closed = session.close().await;
        match (result, closed) {
            (Ok(evidence), Ok(())) => Ok(evidence),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "Failed to close graph session after error");
                }
                Err(e)
            }
        }
    }
}
