//! HTTP server for the rulebook page and its session API.
//!
//! Every user action is one request; each request locks its session,
//! runs the matching [`SessionContext`](crate::session::SessionContext)
//! handler and answers with the refreshed [`SessionView`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/` | The single-page UI |
//! | `GET`    | `/health` | Health check (version, live sessions) |
//! | `POST`   | `/api/session` | Start a session |
//! | `GET`    | `/api/session/{id}` | Current view |
//! | `DELETE` | `/api/session/{id}` | End a session |
//! | `POST`   | `/api/session/{id}/key` | Enter the model key |
//! | `POST`   | `/api/session/{id}/select` | Select a game |
//! | `POST`   | `/api/session/{id}/upload` | Upload a rulebook (multipart `file`) |
//! | `POST`   | `/api/session/{id}/ask` | Ask a question |
//!
//! # Error Contract
//!
//! Pipeline failures are not HTTP errors: they come back as notices in a
//! `200` view. Only protocol problems use the error body:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no session with id ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::catalog::BggCatalog;
use crate::config::Config;
use crate::index::create_index;
use crate::llm::OpenAiModels;
use crate::session::{Services, SessionContext, SessionStore, SessionView};
use crate::ui;

const PAGE_TITLE: &str = "Rulebook QA";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    services: Arc<Services>,
    sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(services: Arc<Services>, sessions: Arc<SessionStore>) -> Self {
        Self { services, sessions }
    }
}

/// Wires the production collaborators from configuration.
pub fn build_services(config: &Config) -> anyhow::Result<Services> {
    let catalog = Arc::new(BggCatalog::new(&config.catalog)?);
    let index = Arc::from(create_index(&config.vector_store)?);
    let models = Arc::new(OpenAiModels::new(config.llm.clone()));
    Ok(Services::new(config, catalog, index, models))
}

/// Builds the router. Split from [`run_server`] so tests can drive it
/// without a socket.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_page))
        .route("/health", get(handle_health))
        .route("/api/session", post(handle_create_session))
        .route(
            "/api/session/{id}",
            get(handle_view).delete(handle_end_session),
        )
        .route("/api/session/{id}/key", post(handle_key))
        .route("/api/session/{id}/select", post(handle_select))
        .route("/api/session/{id}/upload", post(handle_upload))
        .route("/api/session/{id}/ask", post(handle_ask))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind`. The server runs
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(build_services(config)?);
    let sessions = SessionStore::new(Duration::from_secs(config.server.session_idle_secs));
    let state = AppState::new(services, Arc::new(sessions));
    let app = router(state, config.server.max_upload_mb * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("rulebook QA listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Looks up a session from its path segment.
async fn session(state: &AppState, id: &str) -> Result<Arc<Mutex<SessionContext>>, AppError> {
    let uuid = Uuid::parse_str(id).map_err(|_| bad_request(format!("invalid session id: {}", id)))?;
    state
        .sessions
        .get(&uuid)
        .await
        .ok_or_else(|| not_found(format!("no session with id {}", id)))
}

// ============ Page & health ============

async fn handle_page() -> Html<String> {
    Html(ui::page(PAGE_TITLE))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sessions: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.sessions.len().await,
    })
}

// ============ Session lifecycle ============

async fn handle_create_session(State(state): State<AppState>) -> Json<SessionView> {
    let handle = state.sessions.create().await;
    let mut ctx = handle.lock().await;
    Json(ctx.take_view())
}

async fn handle_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let handle = session(&state, &id).await?;
    let mut ctx = handle.lock().await;
    Ok(Json(ctx.take_view()))
}

async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let uuid = Uuid::parse_str(&id).map_err(|_| bad_request(format!("invalid session id: {}", id)))?;
    if state.sessions.remove(&uuid).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no session with id {}", id)))
    }
}

// ============ Actions ============

#[derive(Deserialize)]
struct KeyRequest {
    key: String,
}

async fn handle_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<KeyRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = session(&state, &id).await?;
    let mut ctx = handle.lock().await;
    ctx.enter_key(&state.services, &req.key).await;
    Ok(Json(ctx.take_view()))
}

#[derive(Deserialize)]
struct SelectRequest {
    game: String,
}

async fn handle_select(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = session(&state, &id).await?;
    let mut ctx = handle.lock().await;
    ctx.select_game(&state.services, &req.game).await;
    Ok(Json(ctx.take_view()))
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = session(&state, &id).await?;
    let mut ctx = handle.lock().await;
    ctx.ask(&state.services, &req.question).await;
    Ok(Json(ctx.take_view()))
}

/// Reads the multipart `file` field. Other fields are ignored; a request
/// without one is passed on as "no file" so the user gets a warning.
async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    let handle = session(&state, &id).await?;

    let mut file_name: Option<String> = None;
    let mut bytes = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        file_name = field.file_name().map(str::to_string);
        bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?
            .to_vec();
        break;
    }

    let mut ctx = handle.lock().await;
    ctx.upload(&state.services, file_name.as_deref(), &bytes).await;
    Ok(Json(ctx.take_view()))
}
