//! HTTP boundary for the chat service.
//!
//! Exposes session lifecycle and question answering as a JSON API. All
//! routing and status-code mapping lives here; the handlers are thin
//! adapters over [`crate::session::ConversationSession`] and
//! [`SessionRegistry`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Upload a PDF (raw body), create and bind a session |
//! | `POST` | `/chat/{id}/corpus` | Build the retrieval corpus for a session |
//! | `POST` | `/chat/{id}/ask` | Ask a question of a session |
//! | `POST` | `/chat/{id}/destroy` | Destroy a session |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use the envelope:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "session not found: ..." } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `not_ready` /
//! `already_bound` (409), `upstream_error` (502). The caller can always
//! distinguish "session not found" from "session not ready" from
//! "upstream unavailable".

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::corpus::Document;
use crate::error::ChatError;
use crate::extract::extract_pdf_text;
use crate::llm::Message;
use crate::registry::SessionRegistry;
use crate::session::ChatEngine;

/// Uploads larger than this are rejected before extraction.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub registry: Arc<SessionRegistry>,
}

/// Build the router. Separated from [`run_server`] so tests can drive the
/// handlers without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_create))
        .route("/chat/{id}/corpus", post(handle_build_corpus))
        .route("/chat/{id}/ask", post(handle_ask))
        .route("/chat/{id}/destroy", post(handle_destroy))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    println!("docchat listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error envelope.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        let (status, code) = match err {
            ChatError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ChatError::NotBound => (StatusCode::CONFLICT, "not_ready"),
            ChatError::AlreadyBound => (StatusCode::CONFLICT, "already_bound"),
            ChatError::Config(_) | ChatError::Extract(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ChatError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
        };
        Self {
            status,
            code,
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct CreateParams {
    /// Original filename of the uploaded PDF; defaults to `document.pdf`.
    filename: Option<String>,
}

#[derive(Serialize)]
struct CreateResponse {
    id: String,
    filename: String,
    summary: String,
}

/// Create a session from an uploaded PDF (raw request body), extract its
/// text, and bind it (which also summarizes it).
async fn handle_create(
    State(state): State<AppState>,
    Query(params): Query<CreateParams>,
    body: axum::body::Bytes,
) -> Result<Json<CreateResponse>, AppError> {
    let filename = params.filename.unwrap_or_else(|| "document.pdf".to_string());
    let text = extract_pdf_text(&body)?;
    let document = Document::new(filename.clone(), text);

    let mut session = state.engine.new_session();
    session.bind(&state.engine, document).await?;

    let summary = session
        .document()
        .and_then(|d| d.summary.clone())
        .unwrap_or_default();
    let id = session.id.clone();
    state.registry.insert(session);

    Ok(Json(CreateResponse {
        id,
        filename,
        summary,
    }))
}

// ============ POST /chat/{id}/corpus ============

#[derive(Serialize)]
struct ConfirmResponse {
    message: String,
}

async fn handle_build_corpus(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConfirmResponse>, AppError> {
    let handle = state
        .registry
        .get(&id)
        .ok_or(ChatError::SessionNotFound(id))?;
    let mut session = handle.lock().await;
    session.ensure_corpus(&state.engine).await?;

    let filename = session
        .document()
        .map(|d| d.filename.clone())
        .unwrap_or_default();
    Ok(Json(ConfirmResponse {
        message: format!("Corpus generated for {}.", filename),
    }))
}

// ============ POST /chat/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    messages: Vec<Message>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let handle = state
        .registry
        .get(&id)
        .ok_or(ChatError::SessionNotFound(id))?;
    let mut session = handle.lock().await;
    let messages = session.ask(&state.engine, &request.question).await?;
    Ok(Json(AskResponse { messages }))
}

// ============ POST /chat/{id}/destroy ============

async fn handle_destroy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConfirmResponse>, AppError> {
    if !state.registry.remove(&id) {
        return Err(ChatError::SessionNotFound(id).into());
    }
    Ok(Json(ConfirmResponse {
        message: format!("Chat {} destroyed.", id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (
                ChatError::SessionNotFound("x".into()),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (ChatError::NotBound, StatusCode::CONFLICT, "not_ready"),
            (ChatError::AlreadyBound, StatusCode::CONFLICT, "already_bound"),
            (
                ChatError::Config("bad".into()),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                ChatError::Extract("bad pdf".into()),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                ChatError::Upstream("503".into()),
                StatusCode::BAD_GATEWAY,
                "upstream_error",
            ),
        ];
        for (err, status, code) in cases {
            let app_err = AppError::from(err);
            assert_eq!(app_err.status, status);
            assert_eq!(app_err.code, code);
        }
    }
}
