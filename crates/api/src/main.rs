use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use api::cache::AnswerCache;
use api::config::Settings;
use api::error::ApiError;
use api::metrics::{Metrics, MetricsSnapshot, TimedOperation};
use extract::{CompletionClient, Extractor, RetryPolicy};
use graph::{GraphClient, GraphStats, UpsertEngine};
use ingest::{Document, FileReader};
use query::{Outcome, Retriever, RetrieverConfig};

#[derive(Clone)]
struct AppState {
    graph: GraphClient,
    completions: CompletionClient,
    extractor: Arc<Extractor<CompletionClient>>,
    engine: Arc<UpsertEngine<GraphClient>>,
    retriever: Arc<Retriever<CompletionClient, GraphClient>>,
    cache: Option<Arc<AnswerCache>>,
    metrics: Arc<Metrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;
    api::init_tracing(&settings.log_level);
    info!(
        project = %settings.project_name,
        model = %settings.llm.model,
        "starting investigation graph service",
    );

    let graph = GraphClient::connect(
        &settings.graph.uri,
        &settings.graph.user,
        &settings.graph.password,
    )
    .await
    .context("failed to connect to the graph store")?;
    graph
        .init_schema()
        .await
        .context("failed to initialize graph schema")?;

    let retry = RetryPolicy::new(
        settings.llm.max_retries,
        settings.llm.initial_backoff_ms,
        settings.llm.max_backoff_ms,
    );
    let completions = CompletionClient::new(
        settings.llm.base_url.clone(),
        settings.llm.model.clone(),
        settings.llm.api_key.clone(),
        Duration::from_secs(settings.llm.timeout_secs),
        retry,
    )
    .context("failed to build the completion client")?;

    let state = AppState {
        extractor: Arc::new(Extractor::new(completions.clone())),
        engine: Arc::new(UpsertEngine::new(graph.clone())),
        retriever: Arc::new(Retriever::new(
            completions.clone(),
            graph.clone(),
            RetrieverConfig {
                rewrite_on_empty: settings.retriever.rewrite_on_empty,
                max_query_rewrites: settings.retriever.max_query_rewrites,
            },
        )),
        cache: settings
            .cache
            .enabled
            .then(|| Arc::new(AnswerCache::new(settings.cache.max_entries))),
        metrics: Metrics::new(),
        graph,
        completions,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest_documents))
        .route("/ask", post(ask))
        .route("/stats", get(stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!(addr = %settings.bind_addr, "listening");
    axum::serve(listener, app)
        .await
        .context("server stopped unexpectedly")?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    graph: String,
    completions: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let graph = match state.graph.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    let completions = match state.completions.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    Json(HealthResponse {
        status: "ok",
        graph,
        completions,
    })
}

#[derive(Deserialize)]
struct IngestRequest {
    /// Inline document text. Takes precedence over `path`.
    text: Option<String>,
    /// A file or directory of .txt/.md files on the server.
    path: Option<String>,
    /// Label recorded as the document origin; defaults to "inline" or the
    /// file path.
    source: Option<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    run_id: String,
    documents_processed: usize,
    documents_skipped: usize,
    nodes_written: usize,
    relationships_written: usize,
}

async fn ingest_documents(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let run_id = Uuid::new_v4();
    let mut documents = Vec::new();
    let mut skipped = 0;

    match (&request.text, &request.path) {
        (Some(text), _) => {
            let source = request.source.clone().unwrap_or_else(|| "inline".to_string());
            match Document::from_text(&source, text) {
                Some(doc) => documents.push(doc),
                None => skipped += 1,
            }
        }
        (None, Some(path)) => {
            let path = Path::new(path);
            if path.is_dir() {
                let files = FileReader::discover(path).map_err(ApiError::from)?;
                for file in files {
                    match ingest::ingest_file(&file).await.map_err(ApiError::from)? {
                        Some(doc) => documents.push(doc),
                        None => skipped += 1,
                    }
                }
            } else {
                match ingest::ingest_file(path).await.map_err(ApiError::from)? {
                    Some(doc) => documents.push(doc),
                    None => skipped += 1,
                }
            }
        }
        (None, None) => {
            return Err(ApiError::bad_request("provide either text or path"));
        }
    }

    let mut nodes_written = 0;
    let mut relationships_written = 0;
    for doc in &documents {
        let timer = TimedOperation::start();
        info!(%run_id, source = %doc.source, doc_id = %doc.doc_id, "extracting document");
        let extraction = state
            .extractor
            .extract(&doc.text, &doc.source)
            .await
            .map_err(|e| {
                state.metrics.record_request(false);
                ApiError::bad_gateway(format!("extraction failed for {}: {e}", doc.source))
            })?;
        let summary = state.engine.upsert(&extraction).await.map_err(|e| {
            state.metrics.record_request(false);
            ApiError::internal(format!("graph upsert failed for {}: {e}", doc.source))
        })?;
        state
            .metrics
            .record_ingest(timer.elapsed(), summary.nodes_written, summary.relationships_written);
        nodes_written += summary.nodes_written;
        relationships_written += summary.relationships_written;
    }

    state.metrics.record_request(true);
    Ok(Json(IngestResponse {
        run_id: run_id.to_string(),
        documents_processed: documents.len(),
        documents_skipped: skipped,
        nodes_written,
        relationships_written,
    }))
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    outcome: Outcome,
    cypher_query: Option<String>,
    rewrites: usize,
    cached: bool,
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    if let Some(cache) = &state.cache {
        if let Some(answer) = cache.get(&question) {
            info!("answer served from cache");
            state.metrics.record_cache_hit();
            state.metrics.record_request(true);
            return Ok(Json(AskResponse {
                answer,
                outcome: Outcome::Answered,
                cypher_query: None,
                rewrites: 0,
                cached: true,
            }));
        }
    }

    let timer = TimedOperation::start();
    let retrieval = state
        .retriever
        .answer_question(&question)
        .await
        .map_err(|e| {
            state.metrics.record_request(false);
            ApiError::bad_gateway(format!("{e:#}"))
        })?;
    state.metrics.record_ask(timer.elapsed());
    state.metrics.record_request(true);

    if retrieval.outcome == Outcome::Answered {
        if let Some(cache) = &state.cache {
            cache.set(&question, retrieval.answer_text().to_string());
        }
    }

    Ok(Json(AskResponse {
        answer: retrieval.answer_text().to_string(),
        outcome: retrieval.outcome,
        cypher_query: retrieval.state.cypher_query.clone(),
        rewrites: retrieval.rewrites,
        cached: false,
    }))
}

#[derive(Serialize)]
struct StatsResponse {
    graph: GraphStats,
    metrics: MetricsSnapshot,
    answers_cached: usize,
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let graph = state
        .graph
        .stats()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("graph stats failed: {e}")))?;
    Ok(Json(StatsResponse {
        graph,
        metrics: state.metrics.snapshot(),
        answers_cached: state.cache.as_ref().map(|c| c.len()).unwrap_or(0),
    }))
}
