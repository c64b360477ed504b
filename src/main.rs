use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tech_stack_backend::ingestion::notify::{Notification, NotificationKind, Notifier};
use tech_stack_backend::ingestion::{
    Category, Engine, EngineConfig, EngineError, Filter, QueryRequest, QueryRows, RawSource,
    ReconciliationReport,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    notifier: Option<Notifier>,
}

/// HTTP-side settings, loaded next to the engine's own
#[derive(Debug, Clone)]
struct ServerConfig {
    bind_addr: SocketAddr,
    cors_origin: String,
    notify_url: Option<String>,
}

impl ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        Ok(ServerConfig {
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
                .parse()
                .context("BIND_ADDR must be a socket address")?,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            notify_url: std::env::var("NOTIFY_URL").ok().filter(|s| !s.is_empty()),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting tech stack API server...");

    let engine_config = EngineConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;
    info!(
        "Raw area: {:?}, ordered area: {:?}",
        engine_config.raw_root, engine_config.ordered_root
    );

    let engine = Arc::new(Engine::new(engine_config));

    // Startup drift check
    match engine.reconcile().await {
        Ok(ReconciliationReport::FullyIntegrated) => info!("All raw sources are integrated"),
        Ok(ReconciliationReport::Missing(missing)) => {
            for source in &missing {
                warn!("Raw source {} is not integrated", source);
            }
        }
        Err(e) => error!("Startup reconciliation failed: {}", e),
    }

    let notifier = match &server_config.notify_url {
        Some(url) => Some(Notifier::new(url.clone()).context("failed to build HTTP client")?),
        None => None,
    };

    let state = AppState { engine, notifier };
    let app = router(state, &server_config.cors_origin)?;

    info!("Server running on http://{}", server_config.bind_addr);
    let listener = tokio::net::TcpListener::bind(server_config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .context("CORS_ORIGIN must be a valid header value")?,
        )
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/api/health", get(health_check))
        .route("/api/validation/raw-data", get(raw_data))
        .route("/api/validation/ordered-data", get(ordered_data))
        .route("/api/validation/status", get(validation_status))
        .route("/api/validation/integrate", post(integrate))
        .route("/api/data/query", post(query_data))
        .layer(cors)
        .with_state(state))
}

/// Engine errors mapped onto status codes
struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &EngineError) -> StatusCode {
    match err.root() {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Parse { .. }
        | EngineError::SchemaMismatch { .. }
        | EngineError::Query(_)
        | EngineError::BadRequest(_)
        | EngineError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        EngineError::TableConflict { .. } => StatusCode::CONFLICT,
        EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(serde_json::json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Serialize, Deserialize)]
struct ApiResponse {
    status: String,
    service: String,
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        status: "ok".to_string(),
        service: "tech-stack-backend".to_string(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDataEntry {
    tech_stack: String,
    table: String,
    file_name: String,
}

async fn raw_data(State(state): State<AppState>) -> Result<Json<Vec<RawDataEntry>>, ApiError> {
    let entries = state
        .engine
        .list_raw()
        .await?
        .into_iter()
        .map(|source| RawDataEntry {
            file_name: source.file_name(),
            tech_stack: source.tech_stack,
            table: source.table,
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderedDataEntry {
    tech_stack: String,
    table: String,
    data_type: Category,
}

async fn ordered_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderedDataEntry>>, ApiError> {
    let entries = state
        .engine
        .list_ordered()
        .await?
        .into_iter()
        .map(|table| OrderedDataEntry {
            tech_stack: table.tech_stack,
            table: table.table,
            data_type: table.category,
        })
        .collect();
    Ok(Json(entries))
}

async fn validation_status(
    State(state): State<AppState>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    Ok(Json(state.engine.reconcile().await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegrateRequest {
    tech_stack: String,
    table: String,
    data_type: String,
}

async fn integrate(
    State(state): State<AppState>,
    Json(request): Json<IntegrateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let category: Category = request.data_type.parse()?;
    let source = RawSource::new(request.tech_stack, request.table);

    let result = state.engine.ingest(&source, category).await;

    if let Some(notifier) = &state.notifier {
        let notification = match &result {
            Ok(stats) => Notification::new(
                NotificationKind::Success,
                format!("Successfully integrated {} ({} rows)", source, stats.rows),
            ),
            Err(e) => Notification::new(NotificationKind::Error, format!("Failed to integrate: {}", e)),
        };
        notifier.send(&notification).await;
    }

    let stats = result?;
    Ok(Json(serde_json::json!({ "success": true, "stats": stats })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    tech_stack: String,
    table: String,
    data_type: String,
    attributes: Option<Vec<String>>,
    #[serde(default)]
    filters: Vec<Filter>,
    limit: Option<usize>,
}

async fn query_data(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> Result<Json<QueryRows>, ApiError> {
    let category: Category = body.data_type.parse()?;
    let request = QueryRequest {
        attributes: body.attributes,
        filters: body.filters,
        limit: body.limit,
    };
    let rows = state
        .engine
        .select(&body.table, &body.tech_stack, category, &request)
        .await?;
    Ok(Json(rows))
}
