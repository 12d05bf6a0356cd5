//! Pestwise API Gateway
//!
//! The HTTP entry point. Builds the answer pipeline once at startup and
//! serves:
//! - `POST /v1/ask`
//! - `GET /health` and `GET /ready`
//! - `GET /v1/stats`
//! - `POST /v1/knowledge/reload`
//!
//! Startup fails only when configuration or the knowledge base cannot be
//! loaded; an unreachable generation backend just means fallback answers.

mod handlers;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use pestwise_common::{
    cache::CacheConfig, config::AppConfig, metrics, AppError, PerformanceMonitor, ResponseCache,
    SynonymMap,
};
use pestwise_context::generation::backend::OllamaBackend;
use pestwise_context::generation::models::ModelRouter;
use pestwise_context::{AdapterSettings, GenerationAdapter, Orchestrator, QueryClassifier};
use pestwise_knowledge::KnowledgeBase;
use pestwise_search::RetrievalIndex;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting Pestwise API Gateway v{}", pestwise_common::VERSION);
    config.validate()?;
    let config = Arc::new(config);

    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    let state = build_state(config.clone())?;

    // Monitor snapshots until shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let snapshots = state.orchestrator.monitor().clone().spawn_snapshots(
        PathBuf::from(&config.monitor.snapshot_path),
        Duration::from_secs(config.monitor.snapshot_interval_secs),
        shutdown_rx,
    );

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(config.shutdown_timeout(), snapshots).await.is_err() {
        tracing::warn!("Final monitor snapshot did not finish in time");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Compose the pipeline from configuration
fn build_state(config: Arc<AppConfig>) -> Result<AppState, AppError> {
    let mut synonyms = SynonymMap::default();
    synonyms.extend(&config.classifier.synonyms);
    let synonyms = Arc::new(synonyms);

    let (knowledge, report) =
        KnowledgeBase::open(Path::new(&config.knowledge.source_dir), synonyms.clone())?;
    info!(
        frames = report.frames,
        skipped = report.skipped,
        sources = report.sources,
        "Knowledge base loaded"
    );

    let index = RetrievalIndex::from_config(&config.retrieval, synonyms.clone())?;
    info!(documents = index.len(), "Retrieval index built");

    let monitor = Arc::new(PerformanceMonitor::new());
    let backend = OllamaBackend::from_config(&config.generation)?;
    info!(base_url = %backend.base_url(), "Generation backend configured");
    let generator = GenerationAdapter::spawn(
        AdapterSettings::from_config(&config.generation),
        ModelRouter::from_config(&config.generation)?,
        Arc::new(backend),
        monitor.clone(),
    )?;

    let cache = ResponseCache::new(CacheConfig {
        capacity: config.cache.capacity,
        ttl: config.cache.ttl(),
        name: "answer".to_string(),
    });

    let orchestrator = Orchestrator::builder()
        .classifier(QueryClassifier::from_config(&config.classifier, synonyms)?)
        .knowledge(Arc::new(knowledge))
        .retriever(Arc::new(index))
        .generator(generator)
        .cache(Arc::new(cache))
        .monitor(monitor)
        .cache_fallbacks(config.cache.cache_fallbacks)
        .build()?;

    Ok(AppState {
        config,
        orchestrator: Arc::new(orchestrator),
    })
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

    let api_routes = Router::new()
        .route("/ask", post(handlers::ask::ask))
        .route("/stats", get(handlers::stats::stats))
        .route("/knowledge/reload", post(handlers::knowledge::reload));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
