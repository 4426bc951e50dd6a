//! HTTP ingestion API.
//!
//! Exposes the pipeline over JSON HTTP: uploads come in as multipart form
//! data, processing runs in the background, and clients poll the job
//! endpoint for progress.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents` | Upload a file; returns document and job ids |
//! | `GET`  | `/documents` | List documents (soft-deleted ones excluded) |
//! | `GET`  | `/documents/{id}` | Document detail with chunk count and tags |
//! | `DELETE` | `/documents/{id}` | Soft-delete a document |
//! | `POST` | `/documents/{id}/reprocess` | Re-run the pipeline from stored bytes |
//! | `GET`  | `/jobs/{id}` | Job status, progress, and failure reason |
//! | `POST` | `/jobs/{id}/cancel` | Request cancellation of a running job |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "file type 'image' is not in ingest.supported_file_types" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! upload clients.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::models::{Document, ProcessingJob};
use crate::pipeline::Pipeline;

/// Builds the ingestion router. Separate from [`run_server`] so tests can
/// drive it against an ephemeral listener.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The default axum body limit (2 MB) would reject uploads below the
    // configured file cap before `submit` could check them. Size the body
    // limit from the cap, with headroom for multipart framing.
    let body_limit = pipeline.config().ingest.max_file_size_bytes as usize + 64 * 1024;

    Router::new()
        .route("/documents", post(handle_upload).get(handle_list_documents))
        .route("/documents/{id}", get(handle_get_document))
        .route("/documents/{id}", delete(handle_delete_document))
        .route("/documents/{id}/reprocess", post(handle_reprocess))
        .route("/jobs/{id}", get(handle_get_job))
        .route("/jobs/{id}/cancel", post(handle_cancel_job))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(pipeline)
}

/// Starts the ingestion HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated. Each accepted upload spawns a background task that
/// drives its job to a terminal state.
pub async fn run_server(pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let bind_addr = pipeline.config().server.bind.clone();
    let app = router(pipeline);

    println!("Ingestion server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
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
struct AppError {
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

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Upload rejections are client errors; an active-job clash is a conflict;
/// everything else is internal.
fn classify_submit_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("already has an active processing job") {
        conflict(msg)
    } else if msg.contains("byte limit")
        || msg.contains("supported_file_types")
        || msg.contains("chunk_")
        || msg.contains("batch_size")
    {
        bad_request(msg)
    } else {
        internal(msg)
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

// ============ POST /documents ============

#[derive(Serialize)]
struct UploadResponse {
    document_id: String,
    job_id: String,
    document_type: String,
    status: String,
}

/// Handler for `POST /documents`.
///
/// Accepts a multipart form with a `file` field. Validation failures are
/// returned synchronously with no document or job created; on acceptance the
/// pipeline runs in a background task and the response carries the ids to
/// poll.
async fn handle_upload(
    State(pipeline): State<Arc<Pipeline>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut owner_id = "anonymous".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field
                    .file_name()
                    .map(String::from)
                    .ok_or_else(|| bad_request("file field has no filename"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
                upload = Some((filename, bytes.to_vec()));
            }
            "owner_id" => {
                owner_id = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("failed to read owner_id: {}", e)))?;
            }
            _ => {}
        }
    }

    let (filename, content) =
        upload.ok_or_else(|| bad_request("multipart body is missing a 'file' field"))?;

    let (doc, job) = pipeline
        .submit(&filename, &content, &owner_id, None)
        .await
        .map_err(classify_submit_error)?;

    let response = UploadResponse {
        document_id: doc.id.clone(),
        job_id: job.id.clone(),
        document_type: doc.document_type.to_string(),
        status: job.status.as_str().to_string(),
    };

    let job_id = job.id.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.process(&job_id).await {
            eprintln!("Warning: job {} aborted: {}", job_id, e);
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentSummary {
    id: String,
    title: String,
    document_type: String,
    status: String,
    page_count: Option<i64>,
    word_count: Option<i64>,
    uploaded_at: i64,
    processed_at: Option<i64>,
}

fn summarize(doc: &Document) -> DocumentSummary {
    DocumentSummary {
        id: doc.id.clone(),
        title: doc.title.clone(),
        document_type: doc.document_type.to_string(),
        status: doc.status.as_str().to_string(),
        page_count: doc.page_count,
        word_count: doc.word_count,
        uploaded_at: doc.uploaded_at,
        processed_at: doc.processed_at,
    }
}

async fn handle_list_documents(
    State(pipeline): State<Arc<Pipeline>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let docs = pipeline
        .store()
        .list_documents()
        .await
        .map_err(|e| internal(e.to_string()))?;
    let summaries: Vec<DocumentSummary> = docs.iter().map(summarize).collect();
    Ok(Json(serde_json::json!({ "documents": summaries })))
}

// ============ GET /documents/{id} ============

#[derive(Serialize)]
struct DocumentDetail {
    #[serde(flatten)]
    summary: DocumentSummary,
    character_count: Option<i64>,
    language: Option<String>,
    chunk_count: usize,
    tags: Vec<String>,
}

async fn handle_get_document(
    State(pipeline): State<Arc<Pipeline>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, AppError> {
    let doc = pipeline
        .store()
        .get_document(&id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no document with id {}", id)))?;

    let chunks = pipeline
        .store()
        .get_chunks(&id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    let tags = pipeline
        .store()
        .document_tags(&id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(DocumentDetail {
        summary: summarize(&doc),
        character_count: doc.character_count,
        language: doc.language.clone(),
        chunk_count: chunks.len(),
        tags: tags.into_iter().map(|t| t.name).collect(),
    }))
}

// ============ DELETE /documents/{id} ============

async fn handle_delete_document(
    State(pipeline): State<Arc<Pipeline>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    pipeline
        .store()
        .get_document(&id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no document with id {}", id)))?;

    pipeline
        .delete(&id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// ============ POST /documents/{id}/reprocess ============

async fn handle_reprocess(
    State(pipeline): State<Arc<Pipeline>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    pipeline
        .store()
        .get_document(&id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no document with id {}", id)))?;

    // Create the job synchronously so a conflict surfaces to the client,
    // then run it in the background like an upload.
    let job = pipeline.reprocess_job(&id).await.map_err(|e| {
        let msg = e.to_string();
        if msg.contains("already has an active processing job") {
            conflict(msg)
        } else if msg.contains("cannot reprocess") || msg.contains("is deleted") {
            bad_request(msg)
        } else {
            internal(msg)
        }
    })?;

    let job_id = job.id.clone();
    let response = serde_json::json!({ "document_id": id, "job_id": job_id });
    tokio::spawn(async move {
        if let Err(e) = pipeline.process(&job_id).await {
            eprintln!("Warning: job {} aborted: {}", job_id, e);
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

// ============ GET /jobs/{id} ============

#[derive(Serialize)]
struct JobResponse {
    id: String,
    document_id: String,
    job_type: String,
    status: String,
    progress: f64,
    current_step: String,
    total_steps: i64,
    error_message: Option<String>,
    retry_count: u32,
    max_retries: u32,
}

fn job_response(job: &ProcessingJob) -> JobResponse {
    JobResponse {
        id: job.id.clone(),
        document_id: job.document_id.clone(),
        job_type: job.job_type.clone(),
        status: job.status.as_str().to_string(),
        progress: job.progress,
        current_step: job.current_step.clone(),
        total_steps: job.total_steps,
        error_message: job.error_message.clone(),
        retry_count: job.retry_count,
        max_retries: job.max_retries,
    }
}

async fn handle_get_job(
    State(pipeline): State<Arc<Pipeline>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, AppError> {
    let job = pipeline
        .store()
        .get_job(&id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no job with id {}", id)))?;
    Ok(Json(job_response(&job)))
}

// ============ POST /jobs/{id}/cancel ============

async fn handle_cancel_job(
    State(pipeline): State<Arc<Pipeline>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    pipeline
        .store()
        .get_job(&id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no job with id {}", id)))?;

    let accepted = pipeline
        .store()
        .request_cancel(&id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    if !accepted {
        return Err(conflict(format!("job {} is already terminal", id)));
    }
    Ok(Json(serde_json::json!({ "cancelling": id })))
}
