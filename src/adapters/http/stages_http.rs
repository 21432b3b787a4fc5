//! Stage-gate HTTP server.
//!
//! Exposes backlog items, stage initialization and advancement, gate
//! satisfaction and persona lookup over a JSON API.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{GateStatus, Persona, ServerConfig};
use crate::domain::ports::{BacklogRepository, PersonaDirectory};
use crate::services::{AdvanceOutcome, AdvanceRequest, ItemView, StageGateService, StageInitResult};

/// Header identifying the calling agent.
pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// Request to create a backlog item.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    #[serde(default)]
    pub model_tier: Option<String>,
}

/// Request to initialize stages. The body is optional.
#[derive(Debug, Default, Deserialize)]
pub struct InitStagesRequest {
    #[serde(default)]
    pub template: Option<Vec<String>>,
    #[serde(default)]
    pub replace: bool,
}

/// Request to advance a stage. The body is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AdvanceStageRequest {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request to satisfy one or all criteria of the current stage.
#[derive(Debug, Default, Deserialize)]
pub struct SatisfyGateRequest {
    #[serde(default)]
    pub criterion: Option<String>,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub satisfied_by: String,
}

#[derive(Debug, Deserialize)]
pub struct GateStatusParams {
    #[serde(default)]
    pub stage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PersonaParams {
    #[serde(default)]
    pub capability: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmet: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            unmet: None,
            current_stage: None,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error onto a status code and JSON body.
pub fn error_response(err: DomainError) -> ApiError {
    let status = match &err {
        DomainError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        DomainError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::NotInitialized(_)
        | DomainError::AlreadyInitialized(_)
        | DomainError::GateUnmet { .. }
        | DomainError::VelocityCheck { .. }
        | DomainError::TerminalStage { .. }
        | DomainError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        DomainError::Upstream(_) => StatusCode::BAD_GATEWAY,
        DomainError::Configuration(_) | DomainError::DatabaseError(_) | DomainError::SerializationError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if err.is_expected() {
        tracing::debug!(code = err.code(), error = %err, "request rejected");
    } else {
        tracing::error!(code = err.code(), error = %err, "request failed");
    }

    let mut body = ErrorResponse::new(err.to_string(), err.code());
    if let DomainError::GateUnmet { stage, unmet } = err {
        body.unmet = Some(unmet);
        body.current_stage = Some(stage);
    }
    (status, Json(body))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("invalid id: {raw}"), "INVALID_ID")),
        )
    })
}

/// Parse a JSON body; an empty body yields the default when allowed.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes, optional: bool) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        if optional {
            return Ok(T::default());
        }
        return Err(error_response(DomainError::InvalidRequest("request body is required".to_string())));
    }
    serde_json::from_slice(body)
        .map_err(|e| error_response(DomainError::InvalidRequest(format!("invalid request body: {e}"))))
}

fn agent_id(headers: &HeaderMap) -> String {
    headers
        .get(AGENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Shared state for the stage-gate HTTP server.
struct AppState<R: BacklogRepository> {
    service: StageGateService<R>,
    personas: Option<Arc<dyn PersonaDirectory>>,
}

/// Stage-gate HTTP server.
pub struct StagesHttpServer<R: BacklogRepository + 'static> {
    config: ServerConfig,
    service: StageGateService<R>,
    personas: Option<Arc<dyn PersonaDirectory>>,
}

impl<R: BacklogRepository + 'static> StagesHttpServer<R> {
    pub fn new(service: StageGateService<R>, config: ServerConfig) -> Self {
        Self {
            config,
            service,
            personas: None,
        }
    }

    /// Enable persona lookup.
    pub fn with_personas(mut self, personas: Arc<dyn PersonaDirectory>) -> Self {
        self.personas = Some(personas);
        self
    }

    /// Build the router.
    pub fn build_router(self) -> Router {
        let state = Arc::new(AppState {
            service: self.service,
            personas: self.personas,
        });

        let app = Router::new()
            .route("/api/v1/backlog", post(create_item::<R>))
            .route("/api/v1/backlog/{id}", get(get_item::<R>))
            .route("/api/v1/backlog/{id}/init-stages", post(init_stages::<R>))
            .route("/api/v1/backlog/{id}/advance-stage", post(advance_stage::<R>))
            .route("/api/v1/backlog/{id}/gate/satisfy", post(satisfy_gate::<R>))
            .route("/api/v1/backlog/{id}/gate/status", get(gate_status::<R>))
            .route("/api/v1/personas", get(list_personas::<R>))
            .route("/health", get(health_check))
            .with_state(state);

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    fn addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
        Ok(format!("{}:{}", self.config.host, self.config.port).parse()?)
    }

    /// Start the server.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr()?;
        let router = self.build_router();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "stage-gate HTTP server listening");

        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn create_item<R: BacklogRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ItemView>), ApiError> {
    let req: CreateItemRequest = serde_json::from_slice(&body)
        .map_err(|e| error_response(DomainError::InvalidRequest(format!("invalid request body: {e}"))))?;

    let item = state
        .service
        .create_item(&req.title, req.model_tier.as_deref())
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

async fn get_item<R: BacklogRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemView>, ApiError> {
    let id = parse_id(&id)?;
    let item = state.service.get_item(id).await.map_err(error_response)?;
    Ok(Json(item.into()))
}

async fn init_stages<R: BacklogRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<StageInitResult>, ApiError> {
    let id = parse_id(&id)?;
    let req: InitStagesRequest = parse_body(&body, true)?;

    let result = state
        .service
        .initialize(id, req.template.as_deref(), req.replace)
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}

async fn advance_stage<R: BacklogRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdvanceOutcome>, ApiError> {
    let id = parse_id(&id)?;
    let req: AdvanceStageRequest = parse_body(&body, true)?;

    let request = AdvanceRequest {
        force: req.force,
        reason: req.reason,
        actor: agent_id(&headers),
    };
    let outcome = state.service.advance_stage(id, request).await.map_err(error_response)?;
    Ok(Json(outcome))
}

async fn satisfy_gate<R: BacklogRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<GateStatus>, ApiError> {
    let id = parse_id(&id)?;
    let req: SatisfyGateRequest = parse_body(&body, false)?;

    let status = if req.all {
        state.service.satisfy_all(id, None, &req.satisfied_by).await
    } else {
        let criterion = req.criterion.unwrap_or_default();
        state
            .service
            .satisfy_criterion(id, None, &criterion, &req.satisfied_by)
            .await
    }
    .map_err(error_response)?;

    Ok(Json(status))
}

async fn gate_status<R: BacklogRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    Query(params): Query<GateStatusParams>,
) -> Result<Json<GateStatus>, ApiError> {
    let id = parse_id(&id)?;
    let status = state
        .service
        .gate_status(id, params.stage.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(status))
}

async fn list_personas<R: BacklogRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(params): Query<PersonaParams>,
) -> Result<Json<Vec<Persona>>, ApiError> {
    let Some(directory) = state.personas.as_ref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("persona discovery is not configured", "PERSONAS_DISABLED")),
        ));
    };

    let personas = match params.capability.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(capability) => directory.agents_by_capability(capability).await,
        None => directory.list_personas().await,
    }
    .map_err(error_response)?;

    Ok(Json(personas))
}
