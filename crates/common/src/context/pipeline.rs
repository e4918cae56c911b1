//! Query pipeline - one conversational turn end to end
//!
//! resolve → merge with session → fallback → retrieve → format → answer,
//! then record the turn in the session store. Any failure aborts the turn
//! and leaves the session untouched.

use super::context_merger::{ensure_retrievable_intent, merge};
use super::fallback::{FallbackParser, FallbackTrigger};
use super::formatter::ResponseFormatter;
use super::lexicon::Lexicon;
use super::query_parser::QueryParser;
use super::resolved::ResolvedQuery;
use super::retrieval::GraphQueryEngine;
use super::synthesizer::Synthesizer;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::graph::GraphStore;
use crate::llm::TextGenerator;
use crate::metrics;
use crate::session::{SessionContext, SessionStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Result of a successful turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub answer: String,
    pub resolved: ResolvedQuery,
    pub fallback: Option<FallbackTrigger>,
}

/// The query-understanding pipeline
pub struct QueryPipeline {
    parser: QueryParser,
    fallback: FallbackParser,
    engine: GraphQueryEngine,
    formatter: ResponseFormatter,
    synthesizer: Synthesizer,
    sessions: Arc<SessionStore>,
}

impl QueryPipeline {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn GraphStore>,
        generator: Arc<dyn TextGenerator>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let lexicon = Arc::new(Lexicon::new());

        Self {
            parser: QueryParser::new(lexicon.clone()),
            fallback: FallbackParser::new(generator.clone(), lexicon, &config.fallback),
            engine: GraphQueryEngine::new(store, config.retry.clone()),
            formatter: ResponseFormatter::from_config(&config.render),
            synthesizer: Synthesizer::new(generator),
            sessions,
        }
    }

    /// Answer one query for a session
    #[instrument(skip(self, query))]
    pub async fn handle(&self, query: &str, session_id: &str) -> Result<TurnOutcome> {
        let start = Instant::now();
        let result = self.run_turn(query, session_id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) if e.is_client_error() => "client_error",
            Err(_) => "server_error",
        };
        let elapsed = start.elapsed();
        metrics::record_query(elapsed.as_secs_f64(), outcome);
        info!(outcome, latency_ms = elapsed.as_millis() as u64, "Turn finished");

        result
    }

    async fn run_turn(&self, query: &str, session_id: &str) -> Result<TurnOutcome> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput {
                message: "Query must be a non-empty string".to_string(),
            });
        }

        let found = self.parser.parse(query);
        let previous = self.sessions.get(session_id).await;
        let mut resolved = merge(found, &previous);

        let fallback = self.fallback.resolve(query, &previous, &mut resolved).await?;
        ensure_retrievable_intent(&mut resolved);

        if resolved.entities.is_empty() {
            return Err(AppError::UnresolvedEntity);
        }

        info!(
            entities = ?resolved.entities,
            intents = ?resolved.intents,
            fallback = fallback.map(|t| t.as_str()),
            "Resolved query"
        );

        let evidence = self.engine.retrieve(&resolved).await?;
        let formatted = self.formatter.format(&resolved, &evidence);
        let answer = self.synthesizer.synthesize(query, &formatted).await?;

        self.sessions
            .update(
                session_id,
                SessionContext {
                    previous_entities: resolved.entities.iter().cloned().collect(),
                    previous_intents: resolved.intents.iter().copied().collect(),
                },
            )
            .await;

        Ok(TurnOutcome {
            answer,
            resolved,
            fallback,
        })
    }
}
