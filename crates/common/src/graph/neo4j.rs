//! Neo4j store over the HTTP transactional endpoint
//!
//! A session is one explicit transaction: opened on `open_session`,
//! committed on a clean `close`, rolled back once any statement fails.

use super::{CypherStatement, GraphSession, GraphStore, PropertyMap, RelationQuery, RelationRecord};
use crate::config::GraphConfig;
use crate::errors::{is_transient_status, AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Statement<'a> {
    statement: &'a str,
    parameters: &'a PropertyMap,
    result_data_contents: [&'static str; 1],
}

#[derive(Serialize)]
struct StatementBatch<'a> {
    statements: Vec<Statement<'a>>,
}

impl<'a> StatementBatch<'a> {
    fn new(statements: &'a [CypherStatement]) -> Self {
        Self {
            statements: statements
                .iter()
                .map(|s| Statement {
                    statement: &s.statement,
                    parameters: &s.parameters,
                    result_data_contents: ["row"],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    commit: Option<String>,
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

impl From<Neo4jError> for AppError {
    fn from(err: Neo4jError) -> Self {
        AppError::GraphStore {
            transient: err.code.starts_with("Neo.TransientError"),
            message: format!("{}: {}", err.code, err.message),
        }
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    AppError::GraphStore {
        transient: err.is_timeout() || err.is_connect(),
        message: format!("Graph request failed: {}", err),
    }
}

/// Connection settings shared by the store and its sessions
#[derive(Clone)]
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    database: String,
    credentials: Option<(String, Option<String>)>,
}

impl Endpoint {
    fn tx_url(&self) -> String {
        format!("{}/db/{}/tx", self.base_url, self.database)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_deref()),
            None => builder,
        }
    }

    async fn post(&self, url: &str, statements: &[CypherStatement]) -> Result<TxResponse> {
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&StatementBatch::new(statements))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GraphStore {
                message: format!("Neo4j HTTP error {}: {}", status, body),
                transient: is_transient_status(status.as_u16()),
            });
        }

        let mut tx: TxResponse = response.json().await.map_err(|e| AppError::GraphStore {
            message: format!("Failed to parse Neo4j response: {}", e),
            transient: false,
        })?;

        if !tx.errors.is_empty() {
            return Err(tx.errors.remove(0).into());
        }
        Ok(tx)
    }
}

/// Neo4j graph store
pub struct Neo4jStore {
    endpoint: Endpoint,
}

impl Neo4jStore {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: Endpoint {
                client,
                base_url: config.url.trim_end_matches('/').to_string(),
                database: config.database.clone(),
                credentials: config
                    .user
                    .clone()
                    .map(|user| (user, config.password.clone())),
            },
        })
    }

    /// Run statements in one auto-committed transaction
    pub async fn run_in_transaction(&self, statements: &[CypherStatement]) -> Result<()> {
        let url = format!("{}/commit", self.endpoint.tx_url());
        self.endpoint.post(&url, statements).await?;
        Ok(())
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>> {
        let tx = self.endpoint.post(&self.endpoint.tx_url(), &[]).await?;
        let commit_url = tx.commit.ok_or_else(|| AppError::GraphStore {
            message: "Neo4j did not return a commit URL".to_string(),
            transient: false,
        })?;
        let tx_url = commit_url.trim_end_matches("/commit").to_string();

        debug!(tx = %tx_url, "Opened graph transaction");
        Ok(Box::new(Neo4jSession {
            endpoint: self.endpoint.clone(),
            tx_url,
            commit_url,
            state: SessionState::Open,
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.run_in_transaction(&[CypherStatement::new("RETURN 1")])
            .await
    }

    fn backend(&self) -> &'static str {
        "neo4j"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    /// A statement failed; the server has rolled the transaction back
    Failed,
    Closed,
}

struct Neo4jSession {
    endpoint: Endpoint,
    tx_url: String,
    commit_url: String,
    state: SessionState,
}

fn into_record(row: Vec<Value>) -> Result<RelationRecord> {
    let malformed = || AppError::GraphStore {
        message: "Unexpected row shape in Neo4j response".to_string(),
        transient: false,
    };

    let mut values = row.into_iter();
    match (values.next(), values.next(), values.next()) {
        (Some(Value::Object(subject)), Some(Value::String(relation_type)), Some(Value::Object(object))) => {
            Ok(RelationRecord {
                relation_type,
                subject,
                object,
            })
        }
        _ => Err(malformed()),
    }
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn traverse(&mut self, query: &RelationQuery) -> Result<Vec<RelationRecord>> {
        if self.state != SessionState::Open {
            return Err(AppError::GraphStore {
                message: "Graph session is no longer open".to_string(),
                transient: false,
            });
        }

        let statement = query.to_cypher();
        let result = self
            .endpoint
            .post(&self.tx_url, std::slice::from_ref(&statement))
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        response
            .results
            .into_iter()
            .flat_map(|result| result.data)
            .map(|row| into_record(row.row))
            .collect()
    }

    async fn close(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, SessionState::Closed);
        match state {
            SessionState::Closed => Ok(()),
            SessionState::Open => {
                self.endpoint.post(&self.commit_url, &[]).await?;
                debug!(tx = %self.tx_url, "Committed graph transaction");
                Ok(())
            }
            SessionState::Failed => {
                let result = self
                    .endpoint
                    .request(reqwest::Method::DELETE, &self.tx_url)
                    .send()
                    .await;
                // The server may already have discarded the transaction
                if let Err(e) = result {
                    warn!(tx = %self.tx_url, error = %e, "Rollback request failed");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::context::{GraphQueryEngine, Intent, ResolvedQuery};
    use crate::graph::relations;
    use crate::test_support::{serve, CallLog};
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::Arc;

    /// College whose traversals hit a deadlock on the stand-in server
    const DEADLOCKED: &str = "Deadlock College";

    /// Neo4j transactional endpoint stand-in serving one transaction (`tx/1`)
    fn transactional_endpoint(base_url: &str, calls: CallLog) -> Router {
        let commit_url = format!("{}/db/neo4j/tx/1/commit", base_url);

        let begin = {
            let calls = calls.clone();
            move || async move {
                calls.push("begin");
                Json(json!({"commit": commit_url, "results": [], "errors": []}))
            }
        };
        let run = {
            let calls = calls.clone();
            move |Json(body): Json<Value>| async move {
                let name = body["statements"][0]["parameters"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                calls.push(format!("run {}", name));

                if name == DEADLOCKED {
                    return Json(json!({
                        "results": [],
                        "errors": [{
                            "code": "Neo.TransientError.Transaction.DeadlockDetected",
                            "message": "deadlock"
                        }]
                    }));
                }
                Json(json!({
                    "results": [{
                        "columns": ["subject", "relation", "object"],
                        "data": [{"row": [{"name": name}, "HAS_PLACEMENT", {"rate": "92%"}]}]
                    }],
                    "errors": []
                }))
            }
        };
        let rollback = {
            let calls = calls.clone();
            move || async move {
                calls.push("rollback");
                StatusCode::OK
            }
        };
        let commit = {
            let calls = calls.clone();
            move || async move {
                calls.push("commit");
                Json(json!({"results": [], "errors": []}))
            }
        };
        let autocommit = move || async move {
            calls.push("autocommit");
            Json(json!({"results": [], "errors": []}))
        };

        Router::new()
            .route("/db/neo4j/tx", post(begin))
            .route("/db/neo4j/tx/1", post(run).delete(rollback))
            .route("/db/neo4j/tx/1/commit", post(commit))
            .route("/db/neo4j/tx/commit", post(autocommit))
            .route("/db/down/tx", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route("/db/forbidden/tx", post(|| async { StatusCode::BAD_REQUEST }))
    }

    async fn store_with(database: &str) -> (Neo4jStore, CallLog) {
        let calls = CallLog::default();
        let log = calls.clone();
        let base_url = serve(move |base| transactional_endpoint(base, log)).await;

        let config = GraphConfig {
            url: base_url,
            database: database.to_string(),
            ..GraphConfig::default()
        };
        (Neo4jStore::new(&config).unwrap(), calls)
    }

    #[tokio::test]
    async fn test_clean_session_commits() {
        let (store, calls) = store_with("neo4j").await;

        let mut session = store.open_session().await.unwrap();
        let records = session
            .traverse(&RelationQuery::new("PES University", relations::HAS_PLACEMENT))
            .await
            .unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject["name"], "PES University");
        assert_eq!(records[0].object["rate"], "92%");
        assert_eq!(calls.calls(), ["begin", "run PES University", "commit"]);
    }

    #[tokio::test]
    async fn test_failed_statement_rolls_back() {
        let (store, calls) = store_with("neo4j").await;

        let mut session = store.open_session().await.unwrap();
        let err = session
            .traverse(&RelationQuery::new(DEADLOCKED, relations::HAS_PLACEMENT))
            .await
            .unwrap_err();
        assert!(err.is_transient());

        // The transaction is gone; nothing further is sent
        let err = session
            .traverse(&RelationQuery::new("PES University", relations::HAS_PLACEMENT))
            .await
            .unwrap_err();
        assert!(!err.is_transient());

        session.close().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(calls.calls(), ["begin", "run Deadlock College", "rollback"]);
    }

    #[tokio::test]
    async fn test_engine_releases_transaction_on_failure() {
        let (store, calls) = store_with("neo4j").await;
        let engine = GraphQueryEngine::new(Arc::new(store), RetryConfig::fail_fast());
        let resolved = ResolvedQuery {
            entities: ["PES University".to_string(), DEADLOCKED.to_string()]
                .into_iter()
                .collect(),
            intents: [Intent::Placement].into_iter().collect(),
        };

        let result = engine.retrieve(&resolved).await;

        assert!(matches!(result, Err(AppError::GraphStore { transient: true, .. })));
        assert_eq!(
            calls.calls(),
            ["begin", "run PES University", "run Deadlock College", "rollback"]
        );
    }

    #[tokio::test]
    async fn test_run_in_transaction_autocommits() {
        let (store, calls) = store_with("neo4j").await;

        store.run_in_transaction(&[CypherStatement::new("RETURN 1")]).await.unwrap();
        store.ping().await.unwrap();

        assert_eq!(calls.calls(), ["autocommit", "autocommit"]);
    }

    #[tokio::test]
    async fn test_http_status_classification() {
        let (store, _) = store_with("down").await;
        let err = store.open_session().await.err().unwrap();
        assert!(matches!(err, AppError::GraphStore { transient: true, .. }));

        let (store, _) = store_with("forbidden").await;
        let err = store.open_session().await.err().unwrap();
        assert!(matches!(err, AppError::GraphStore { transient: false, .. }));
    }

    #[test]
    fn test_statement_batch_shape() {
        let statements = vec![RelationQuery::new("RV College of Engineering", relations::OFFERS_COURSE).to_cypher()];
        let json = serde_json::to_value(StatementBatch::new(&statements)).unwrap();

        assert_eq!(json["statements"][0]["resultDataContents"][0], "row");
        assert_eq!(
            json["statements"][0]["parameters"]["name"],
            "RV College of Engineering"
        );
    }

    #[test]
    fn test_transaction_response_rows() {
        let body = json!({
            "commit": "http://localhost:7474/db/neo4j/tx/7/commit",
            "results": [{
                "columns": ["subject", "relation", "object"],
                "data": [{"row": [{"name": "PES University"}, "HAS_PLACEMENT", {"rate": "92%"}], "meta": []}]
            }],
            "errors": []
        });
        let tx: TxResponse = serde_json::from_value(body).unwrap();
        let row = tx.results.into_iter().next().unwrap().data.into_iter().next().unwrap();
        let record = into_record(row.row).unwrap();

        assert_eq!(record.relation_type, "HAS_PLACEMENT");
        assert_eq!(record.subject["name"], "PES University");
        assert_eq!(record.object["rate"], "92%");
    }

    #[test]
    fn test_unexpected_row_shape() {
        let result = into_record(vec![json!("PES University")]);
        assert!(matches!(result, Err(AppError::GraphStore { transient: false, .. })));
    }

    #[test]
    fn test_transient_error_codes() {
        let err: AppError = Neo4jError {
            code: "Neo.TransientError.Transaction.DeadlockDetected".to_string(),
            message: "deadlock".to_string(),
        }
        .into();
        assert!(err.is_transient());

        let err: AppError = Neo4jError {
            code: "Neo.ClientError.Statement.SyntaxError".to_string(),
            message: "bad".to_string(),
        }
        .into();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_tx_url() {
        let config = GraphConfig {
            url: "http://neo4j:7474/".to_string(),
            ..GraphConfig::default()
        };
        let store = Neo4jStore::new(&config).unwrap();
        assert_eq!(store.endpoint.tx_url(), "http://neo4j:7474/db/neo4j/tx");
    }
}
