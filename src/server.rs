//! HTTP API for the study companion.
//!
//! Every handler delegates to the same library functions the CLI uses, so
//! both surfaces share one set of validation rules and error types.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/pdfs` | Upload raw PDF bytes; name from the `X-File-Name` header |
//! | `GET`    | `/pdfs` | List coursebooks, newest first |
//! | `GET`    | `/pdfs/{id}` | One coursebook |
//! | `GET`    | `/pdfs/{id}/file` | The stored PDF bytes |
//! | `DELETE` | `/pdfs/{id}` | Delete a coursebook and everything derived from it |
//! | `POST`   | `/pdfs/{id}/embeddings` | Extract, chunk and embed (re-process) |
//! | `GET`    | `/pdfs/{id}/conversations` | Conversations about a coursebook |
//! | `POST`   | `/chat` | Ask a question `{ pdf_id, query, conversation_id? }` |
//! | `GET`    | `/conversations/{id}/messages` | Messages of a conversation |
//! | `POST`   | `/quizzes` | Generate a quiz `{ pdf_id }` |
//! | `GET`    | `/quizzes/{id}` | A stored quiz |
//! | `POST`   | `/quizzes/{id}/attempts` | Submit answers `{ answers }` |
//! | `GET`    | `/attempts?pdf_id=` | Attempt history |
//! | `GET`    | `/progress` | Per-coursebook progress |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "pdf not found: 42" } }
//! ```
//!
//! Malformed JSON bodies are reported as `bad_request` too.
//!
//! Error codes: `bad_request` (400), `provider_disabled` (400), `not_found` (404),
//! `payload_too_large` (413), `upstream` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{self, AskRequest, ChatAnswer};
use crate::config::Config;
use crate::context::AppContext;
use crate::error::StudyError;
use crate::extract::ExtractError;
use crate::ingest::{self, IngestReport};
use crate::library;
use crate::models::{Answers, AttemptRecord, Conversation, Message, Pdf, Quiz};
use crate::progress::{self, CoursebookProgress};
use crate::quiz::{self, AttemptResult};

/// Header carrying the original file name of an upload.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Starts the HTTP server.
///
/// Builds an [`AppContext`] from `config` (connecting the database and the
/// configured providers) and serves on `[server].bind` until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = AppContext::from_config(config).await?;
    run_server_with_context(ctx).await
}

/// Starts the HTTP server with an already-built context.
///
/// Used by tests and embedders that supply their own providers.
pub async fn run_server_with_context(ctx: AppContext) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = router(ctx);

    println!("Study server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The full route table with CORS and the upload body limit applied.
pub fn router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = ctx.config.storage.max_upload_bytes;

    Router::new()
        .route("/health", get(handle_health))
        .route("/pdfs", post(handle_upload).get(handle_list_pdfs))
        .route("/pdfs/{id}", get(handle_get_pdf).delete(handle_delete_pdf))
        .route("/pdfs/{id}/file", get(handle_pdf_file))
        .route("/pdfs/{id}/embeddings", post(handle_process))
        .route("/pdfs/{id}/conversations", get(handle_list_conversations))
        .route("/chat", post(handle_chat))
        .route("/conversations/{id}/messages", get(handle_messages))
        .route("/quizzes", post(handle_generate_quiz))
        .route("/quizzes/{id}", get(handle_get_quiz))
        .route("/quizzes/{id}/attempts", post(handle_submit_attempt))
        .route("/attempts", get(handle_attempts))
        .route("/progress", get(handle_progress))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(ctx)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
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

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<StudyError>() {
            let message = e.to_string();
            return match e {
                StudyError::NotFound { .. } => {
                    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
                }
                StudyError::InvalidInput(_) | StudyError::NoText(_) => {
                    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
                }
                StudyError::ProviderDisabled(_) => {
                    AppError::new(StatusCode::BAD_REQUEST, "provider_disabled", message)
                }
                StudyError::TooLarge { .. } => {
                    AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
                }
                StudyError::Upstream(_) => AppError::new(StatusCode::BAD_GATEWAY, "upstream", message),
            };
        }
        if let Some(e) = err.downcast_ref::<ExtractError>() {
            return AppError::new(StatusCode::BAD_REQUEST, "bad_request", e.to_string());
        }
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{:#}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Coursebooks ============

/// Handler for `POST /pdfs`.
///
/// The request body is the raw file. Bodies over `[storage].max_upload_bytes`
/// are rejected with `413`.
async fn handle_upload(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Pdf>), AppError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::from(anyhow::Error::from(StudyError::TooLarge {
                limit: ctx.config.storage.max_upload_bytes,
            }))
        } else {
            AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
        }
    })?;

    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let pdf = library::upload_pdf(&ctx, file_name, &body).await?;
    Ok((StatusCode::CREATED, Json(pdf)))
}

async fn handle_list_pdfs(State(ctx): State<AppContext>) -> ApiResult<Vec<Pdf>> {
    Ok(Json(library::list_pdfs(&ctx).await?))
}

async fn handle_get_pdf(State(ctx): State<AppContext>, Path(id): Path<String>) -> ApiResult<Pdf> {
    Ok(Json(library::get_pdf(&ctx, &id).await?))
}

/// Handler for `GET /pdfs/{id}/file`: the uploaded bytes, for viewing next
/// to the chat.
async fn handle_pdf_file(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let (pdf, bytes) = library::read_pdf_file(&ctx, &id).await?;
    let disposition = format!("inline; filename=\"{}\"", pdf.file_name.replace('"', ""));
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn handle_delete_pdf(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    library::delete_pdf(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_process(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<IngestReport> {
    Ok(Json(ingest::process_pdf(&ctx, &id).await?))
}

// ============ Chat ============

async fn handle_list_conversations(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Conversation>> {
    Ok(Json(chat::list_conversations(&ctx, &id).await?))
}

async fn handle_chat(
    State(ctx): State<AppContext>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> ApiResult<ChatAnswer> {
    let Json(request) = body?;
    Ok(Json(chat::ask(&ctx, &request).await?))
}

async fn handle_messages(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Message>> {
    Ok(Json(chat::conversation_messages(&ctx, &id).await?))
}

// ============ Quizzes ============

#[derive(Deserialize)]
struct GenerateQuizRequest {
    pdf_id: String,
}

async fn handle_generate_quiz(
    State(ctx): State<AppContext>,
    body: Result<Json<GenerateQuizRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Quiz>), AppError> {
    let Json(request) = body?;
    let quiz = quiz::generate_quiz(&ctx, &request.pdf_id).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

async fn handle_get_quiz(State(ctx): State<AppContext>, Path(id): Path<String>) -> ApiResult<Quiz> {
    Ok(Json(quiz::get_quiz(&ctx, &id).await?))
}

#[derive(Deserialize)]
struct SubmitAttemptRequest {
    #[serde(default)]
    answers: Answers,
}

async fn handle_submit_attempt(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    body: Result<Json<SubmitAttemptRequest>, JsonRejection>,
) -> ApiResult<AttemptResult> {
    let Json(request) = body?;
    Ok(Json(quiz::submit_attempt(&ctx, &id, &request.answers).await?))
}

// ============ Progress ============

#[derive(Deserialize)]
struct AttemptsQuery {
    pdf_id: Option<String>,
}

async fn handle_attempts(
    State(ctx): State<AppContext>,
    Query(query): Query<AttemptsQuery>,
) -> ApiResult<Vec<AttemptRecord>> {
    Ok(Json(
        progress::attempt_history(&ctx, query.pdf_id.as_deref()).await?,
    ))
}

async fn handle_progress(State(ctx): State<AppContext>) -> ApiResult<Vec<CoursebookProgress>> {
    Ok(Json(progress::progress_summary(&ctx).await?))
}
