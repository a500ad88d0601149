//! HTTP endpoints
//!
//! REST surface over the engine: inbound event intake, collaboration
//! status/control, analytics, health and Prometheus metrics. The webhook
//! transport that produces inbound events lives outside this service.

use std::time::Duration;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use chatflow_core::conversation::{CollaborationMode, ConversationOutcome, InboundMessage};
use chatflow_engine::{EngineError, TimeRange};

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );
    let timeout = Duration::from_secs(state.settings.server.request_timeout_secs);

    Router::new()
        // Inbound normalized customer events
        .route("/api/inbound", post(handle_inbound))
        // Collaboration status + control
        .route(
            "/api/conversations/:id/collaboration",
            get(collaboration_status),
        )
        .route(
            "/api/conversations/:id/takeover/request",
            post(request_takeover),
        )
        .route("/api/conversations/:id/takeover/start", post(start_takeover))
        .route("/api/conversations/:id/takeover/end", post(end_takeover))
        .route("/api/conversations/:id/suggestions", post(suggestions))
        .route("/api/conversations/:id/outcome", post(set_outcome))
        // Analytics
        .route("/api/analytics", get(analytics))
        // Health + metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build the CORS layer from configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        tracing::info!("no CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Map engine errors to HTTP responses
fn engine_error_response(err: EngineError) -> Response {
    let (status, message) = match &err {
        EngineError::HumanControl => (StatusCode::CONFLICT, err.to_string()),
        EngineError::InvalidTransition(_) => (StatusCode::CONFLICT, err.to_string()),
        EngineError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        EngineError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        EngineError::Llm(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        EngineError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn handle_inbound(
    State(state): State<AppState>,
    Json(inbound): Json<InboundMessage>,
) -> Response {
    match state.engine.handle_inbound(inbound).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => engine_error_response(err),
    }
}

async fn collaboration_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.engine.collaboration_status(id).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => engine_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeoverRequestBody {
    reason: String,
    #[serde(default = "default_actor")]
    requested_by: String,
}

fn default_actor() -> String {
    "system".to_string()
}

async fn request_takeover(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TakeoverRequestBody>,
) -> Response {
    match state
        .engine
        .request_takeover(id, &body.reason, &body.requested_by)
        .await
    {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => engine_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeoverStartBody {
    reason: String,
    #[serde(default = "default_actor")]
    actor: String,
}

async fn start_takeover(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TakeoverStartBody>,
) -> Response {
    match state.engine.start_takeover(id, &body.reason, &body.actor).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeoverEndBody {
    #[serde(default)]
    return_to: Option<CollaborationMode>,
    #[serde(default = "default_actor")]
    actor: String,
}

async fn end_takeover(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TakeoverEndBody>,
) -> Response {
    let return_to = body.return_to.unwrap_or(CollaborationMode::AiOnly);
    match state.engine.end_takeover(id, return_to, &body.actor).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionsBody {
    current_message: String,
}

async fn suggestions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SuggestionsBody>,
) -> Response {
    match state.engine.ai_suggestions(id, &body.current_message).await {
        Ok(suggestions) => Json(serde_json::json!({ "suggestions": suggestions })).into_response(),
        Err(err) => engine_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct OutcomeBody {
    outcome: ConversationOutcome,
}

async fn set_outcome(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<OutcomeBody>,
) -> Response {
    match state.engine.set_outcome(id, body.outcome).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    #[serde(default = "default_range")]
    range: String,
}

fn default_range() -> String {
    "24h".to_string()
}

async fn analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Response {
    let Some(range) = TimeRange::parse(&query.range) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "range must be one of 24h, 7d, 30d" })),
        )
            .into_response();
    };

    match state.engine.analytics(range).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => engine_error_response(err),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.prometheus.render()
}
