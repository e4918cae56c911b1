//! CampusCandid API Gateway
//!
//! The HTTP entry point for the question-answering pipeline.
//! Handles:
//! - Request routing and validation
//! - Wiring the graph store, language model and session store
//! - Observability (logging, metrics, request ids)

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use campuscandid_common::{
    config::{AppConfig, ObservabilityConfig},
    graph::{self, GraphStore},
    llm::{self, TextGenerator},
    metrics, QueryPipeline, SessionStore,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<QueryPipeline>,
    pub store: Arc<dyn GraphStore>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn GraphStore>, generator: Arc<dyn TextGenerator>) -> Self {
        let sessions = Arc::new(SessionStore::from_config(&config.session));
        let pipeline = Arc::new(QueryPipeline::new(
            &config,
            store.clone(),
            generator,
            sessions.clone(),
        ));

        Self {
            config: Arc::new(config),
            pipeline,
            store,
            sessions,
        }
    }
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting CampusCandid API Gateway v{}",
        campuscandid_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Suffix("query_duration_seconds".to_string()),
                metrics::QUERY_BUCKETS,
            )?
            .install()?;
        metrics::register_metrics();
        info!("Metrics exporter listening on {}", addr);
    }

    // Initialize collaborators
    let store = graph::create_store(&config.graph)?;
    let generator = llm::create_generator(&config.llm, &config.retry)?;
    info!(
        graph = store.backend(),
        model = generator.model_name(),
        "Collaborators initialised"
    );

    let state = AppState::new(config, store, generator);
    spawn_session_purge(state.sessions.clone(), state.config.session_ttl());

    // Build the router
    let app = create_router(state.clone());

    // Start the server
    let host: std::net::IpAddr = state.config.server.host.parse()?;
    let addr = SocketAddr::new(host, state.config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_with_drain_limit(listener, app, shutdown_signal(), state.config.shutdown_timeout()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically drop idle sessions so memory is reclaimed between requests
fn spawn_session_purge(sessions: Arc<SessionStore>, ttl: Duration) {
    let period = (ttl / 2).max(Duration::from_secs(30));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired().await;
            if purged > 0 {
                info!(purged, "Purged idle sessions");
            }
        }
    });
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/api/query", post(handlers::query::query))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Serve until `signal` fires, then give open connections `drain_limit` to finish
async fn serve_with_drain_limit<F>(
    listener: TcpListener,
    app: Router,
    signal: F,
    drain_limit: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let signalled = Arc::new(Notify::new());
    let notify = signalled.clone();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            notify.notify_one();
        })
        .into_future();

    let deadline = async {
        signalled.notified().await;
        tokio::time::sleep(drain_limit).await;
    };

    tokio::select! {
        result = server => result,
        _ = deadline => {
            warn!(
                drain_limit_secs = drain_limit.as_secs_f64(),
                "Connections still open after drain limit, shutting down anyway"
            );
            Ok(())
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use campuscandid_common::config::RetryConfig;
    use campuscandid_common::graph::{fixtures::college_dataset, relations, MemoryGraphStore};
    use campuscandid_common::llm::MockGenerator;
    use serde_json::{json, Value};
    use tokio::io::AsyncWriteExt;
    use tower::ServiceExt;

    fn app_with(store: MemoryGraphStore, mock: MockGenerator) -> Router {
        let config = AppConfig {
            retry: RetryConfig::fail_fast(),
            ..AppConfig::default()
        };
        create_router(AppState::new(config, Arc::new(store), Arc::new(mock)))
    }

    fn app(mock: MockGenerator) -> Router {
        app_with(MemoryGraphStore::from_fixtures(&college_dataset()), mock)
    }

    fn post_query(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(MockGenerator::new()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_backend() {
        let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
        let (status, body) = send(app(MockGenerator::new()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["graph"]["backend"], "memory");
    }

    #[tokio::test]
    async fn test_query_success() {
        let mock = MockGenerator::new().with_answer("BMSIT placed 85% of students at 8 LPA.");
        let body = json!({"query": "placement stats for bmsit"}).to_string();

        let (status, body) = send(app(mock), post_query(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "BMSIT placed 85% of students at 8 LPA."}));
    }

    #[tokio::test]
    async fn test_session_id_carries_context() {
        let app = app(MockGenerator::new());

        let first = json!({"query": "placements at pes", "sessionId": "abc"}).to_string();
        let (status, _) = send(app.clone(), post_query(first)).await;
        assert_eq!(status, StatusCode::OK);

        let follow_up = json!({"query": "what about faculty", "sessionId": "abc"}).to_string();
        let (status, body) = send(app.clone(), post_query(follow_up)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["response"].as_str().unwrap().contains("Faculty details for PES University"));

        let other = json!({"query": "what about faculty"}).to_string();
        let (status, _) = send(app, post_query(other)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_query_is_bad_request() {
        for body in [r#"{}"#, r#"{"query": ""}"#, r#"{"query": "   "}"#, r#"{"query": 42}"#, "not json"] {
            let (status, json) = send(app(MockGenerator::new()), post_query(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert!(json["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_unrecognized_college_is_bad_request() {
        let body = json!({"query": "tell me something nice"}).to_string();
        let (status, json) = send(app(MockGenerator::new()), post_query(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No college recognized in the query");
    }

    #[tokio::test]
    async fn test_graph_failure_is_generic_server_error() {
        let store = MemoryGraphStore::from_fixtures(&college_dataset()).failing_on(relations::HAS_PLACEMENT);
        let body = json!({"query": "placements at pes"}).to_string();

        let (status, json) = send(app_with(store.clone(), MockGenerator::new()), post_query(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({"error": "Internal server error"}));
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_language_model_failure_is_generic_server_error() {
        let mock = MockGenerator::new().failing_on(llm::GenerationPurpose::Answer);
        let body = json!({"query": "placements at pes"}).to_string();

        let (status, json) = send(app(mock), post_query(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_shutdown_drain_is_bounded() {
        let entered = Arc::new(Notify::new());
        let slow = Router::new().route(
            "/slow",
            get({
                let entered = entered.clone();
                move || async move {
                    entered.notify_one();
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_with_drain_limit(
            listener,
            slow,
            async {
                let _ = stop_rx.await;
            },
            Duration::from_millis(100),
        ));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        entered.notified().await;

        stop_tx.send(()).unwrap();
        let finished = tokio::time::timeout(Duration::from_secs(5), server).await;

        assert!(finished.is_ok(), "server kept draining past its limit");
        assert!(finished.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_without_open_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let app = app(MockGenerator::new());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve_with_drain_limit(listener, app, async {}, Duration::from_secs(30)),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(MockGenerator::new()).oneshot(request).await.unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }
}
