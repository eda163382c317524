//! Upload routes
//!
//! The multipart boundary lives here: file type and size are rejected
//! before any job exists, with errors distinct from processing failures.
//! Accepted files are streamed to the upload directory chunk by chunk,
//! never buffered whole.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use talentflow_ingest::SheetFormat;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::commands::{
    confirm_mapping::handle as handle_confirm_mapping,
    submit::handle as handle_submit,
    ConfirmMappingCommand, ConfirmMappingError, ConfirmMappingResponse, SubmitUploadCommand,
    SubmitUploadError, SubmitUploadResponse,
};
use super::queries::{
    get_status::handle as handle_get_status,
    list_uploads::handle as handle_list_uploads,
    GetUploadStatusError, GetUploadStatusQuery, ListUploadsError, ListUploadsQuery,
    ListUploadsResponse, UploadStatusResponse,
};
use crate::error::AppError;
use crate::features::FeatureState;

/// Headroom for multipart framing around the file itself; bodies past
/// `max_file_bytes` plus this margin are cut off by the outer body limit.
const UPLOAD_FRAMING_MARGIN: u64 = 64 * 1024;

/// Routes mounted at `/upload`
pub fn upload_routes(max_file_bytes: u64) -> Router<FeatureState> {
    Router::new()
        .route("/", post(submit_upload))
        .route("/:job_id/confirm-mapping", post(confirm_upload_mapping))
        .route("/:job_id/status", get(get_upload_status))
        .layer(DefaultBodyLimit::max(
            (max_file_bytes + UPLOAD_FRAMING_MARGIN) as usize,
        ))
}

/// Routes mounted at `/uploads`
pub fn uploads_routes() -> Router<FeatureState> {
    Router::new().route("/", get(list_uploads))
}

impl From<SubmitUploadError> for AppError {
    fn from(err: SubmitUploadError) -> Self {
        match err {
            SubmitUploadError::Unreadable(message) => AppError::Validation(message),
            SubmitUploadError::QueueUnavailable => {
                AppError::Internal("ingestion queue is unavailable".to_string())
            }
            SubmitUploadError::Store(e) => e.into(),
        }
    }
}

impl From<ConfirmMappingError> for AppError {
    fn from(err: ConfirmMappingError) -> Self {
        match err {
            ConfirmMappingError::JobNotFound(id) => AppError::NotFound(format!("upload job {id}")),
            ConfirmMappingError::JobNotPending { job_id, status } => {
                AppError::Conflict(format!("upload job {job_id} is already {status}"))
            }
            ConfirmMappingError::Unreadable(message) => AppError::Validation(message),
            ConfirmMappingError::QueueUnavailable => {
                AppError::Internal("ingestion queue is unavailable".to_string())
            }
            ConfirmMappingError::Store(e) => e.into(),
        }
    }
}

impl From<GetUploadStatusError> for AppError {
    fn from(err: GetUploadStatusError) -> Self {
        match err {
            GetUploadStatusError::JobNotFound(id) => {
                AppError::NotFound(format!("upload job {id}"))
            }
            GetUploadStatusError::Store(e) => e.into(),
        }
    }
}

impl From<ListUploadsError> for AppError {
    fn from(err: ListUploadsError) -> Self {
        match err {
            ListUploadsError::InvalidStatus(status) => {
                AppError::Validation(format!("invalid status filter '{status}'"))
            }
            ListUploadsError::Store(e) => e.into(),
        }
    }
}

/// Accept a spreadsheet upload
///
/// POST /upload (multipart, field "file")
async fn submit_upload(
    State(state): State<FeatureState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitUploadResponse>, AppError> {
    let mut saved: Option<(String, String)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        multipart_read_error(e, "malformed multipart body", 0, state.uploads.max_file_bytes)
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let source_file = field
            .file_name()
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::Validation("missing file name".to_string()))?;

        if SheetFormat::from_path(&source_file).is_none() {
            let ext = std::path::Path::new(&source_file)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            return Err(AppError::UnsupportedFileType(ext));
        }

        let storage_path = std::path::Path::new(&state.uploads.dir)
            .join(format!("{}_{}", Uuid::new_v4(), source_file));
        tokio::fs::create_dir_all(&state.uploads.dir).await?;
        let mut file = tokio::fs::File::create(&storage_path).await?;

        let mut written: u64 = 0;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    drop(file);
                    tokio::fs::remove_file(&storage_path).await.ok();
                    return Err(multipart_read_error(
                        e,
                        "upload truncated",
                        written,
                        state.uploads.max_file_bytes,
                    ));
                }
            };
            written += chunk.len() as u64;
            if written > state.uploads.max_file_bytes {
                drop(file);
                tokio::fs::remove_file(&storage_path).await.ok();
                return Err(AppError::FileTooLarge {
                    size: written,
                    limit: state.uploads.max_file_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        saved = Some((source_file, storage_path.display().to_string()));
        break;
    }

    let (source_file, storage_path) =
        saved.ok_or_else(|| AppError::Validation("no file field in request".to_string()))?;

    let response = handle_submit(
        &state.stores,
        &state.resolver,
        &state.queue,
        SubmitUploadCommand {
            source_file,
            storage_path,
        },
    )
    .await?;
    Ok(Json(response))
}

/// Confirm a manual header mapping
///
/// POST /upload/:job_id/confirm-mapping
async fn confirm_upload_mapping(
    State(state): State<FeatureState>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<ConfirmMappingBody>,
) -> Result<Json<ConfirmMappingResponse>, AppError> {
    let response = handle_confirm_mapping(
        &state.stores,
        &state.resolver,
        &state.queue,
        ConfirmMappingCommand {
            job_id,
            mapping: body.mapping,
        },
    )
    .await?;
    Ok(Json(response))
}

#[derive(serde::Deserialize)]
struct ConfirmMappingBody {
    mapping: std::collections::BTreeMap<
        String,
        Option<talentflow_ingest::mapping::CanonicalField>,
    >,
}

/// Poll job status
///
/// GET /upload/:job_id/status
async fn get_upload_status(
    State(state): State<FeatureState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<UploadStatusResponse>, AppError> {
    let response = handle_get_status(&state.stores, GetUploadStatusQuery { job_id }).await?;
    Ok(Json(response))
}

/// List recent upload jobs
///
/// GET /uploads?status=completed&page=1&limit=20
async fn list_uploads(
    State(state): State<FeatureState>,
    Query(query): Query<ListUploadsQuery>,
) -> Result<Json<ListUploadsResponse>, AppError> {
    let response = handle_list_uploads(&state.stores, query).await?;
    Ok(Json(response))
}

/// Map a multipart read failure onto the API error space.
///
/// A body that exceeds the outer request limit surfaces as a
/// `PAYLOAD_TOO_LARGE` multipart error before the per-file size
/// accounting can reject it, and must produce the same 413 body an
/// oversized file does.
fn multipart_read_error(
    err: MultipartError,
    context: &str,
    bytes_seen: u64,
    limit: u64,
) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::FileTooLarge {
            size: bytes_seen.max(limit + UPLOAD_FRAMING_MARGIN),
            limit,
        };
    }
    AppError::Validation(format!("{context}: {err}"))
}

fn sanitize_file_name(name: &str) -> String {
    let base = std::path::Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
