//! Submit upload command
//!
//! Registers an accepted spreadsheet as a pending job, resolves its header
//! mapping and either enqueues ingestion immediately or hands the headers
//! back for manual mapping. File type and size rejection happens earlier,
//! at the multipart boundary, before this command runs.

use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use talentflow_common::header_signature;
use talentflow_ingest::reader;
use uuid::Uuid;

use crate::ingest::{IngestQueue, MappingOutcome, MappingResolver, QueuedIngest};
use crate::models::{JobStatus, RowError, UploadJob};
use crate::store::{StoreError, Stores};

/// Command to submit an already-saved upload for ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitUploadCommand {
    /// Original file name as uploaded by the client.
    pub source_file: String,
    /// Path the file was saved to on disk.
    pub storage_path: String,
}

/// Response from submitting an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitUploadResponse {
    /// Mapping was resolved; ingestion is queued.
    #[serde(rename_all = "camelCase")]
    Processing { job_id: Uuid, status: JobStatus },
    /// Nothing could be mapped; the client must confirm a mapping.
    #[serde(rename_all = "camelCase")]
    NeedsMapping {
        job_id: Uuid,
        needs_mapping: bool,
        headers: Vec<String>,
    },
}

/// Errors that can occur when submitting an upload
#[derive(Debug, thiserror::Error)]
pub enum SubmitUploadError {
    #[error("file could not be read: {0}")]
    Unreadable(String),

    #[error("ingestion queue is unavailable")]
    QueueUnavailable,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<SubmitUploadResponse, SubmitUploadError>> for SubmitUploadCommand {}

/// Handler for upload submission.
///
/// The job record is created first so a header-read failure still leaves a
/// visible failed job rather than silently dropping the upload.
pub async fn handle(
    stores: &Stores,
    resolver: &MappingResolver,
    queue: &IngestQueue,
    command: SubmitUploadCommand,
) -> Result<SubmitUploadResponse, SubmitUploadError> {
    let now = Utc::now();
    let job = UploadJob {
        id: Uuid::new_v4(),
        source_file: command.source_file.clone(),
        storage_path: command.storage_path.clone(),
        status: JobStatus::Pending,
        header_signature: None,
        total_rows: None,
        processed_rows: 0,
        error_count: 0,
        errors: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    stores.jobs.create_job(&job).await?;

    let headers = match reader::open_headers(&command.storage_path) {
        Ok(headers) => headers,
        Err(e) => {
            let message = format!("failed to read headers: {e}");
            stores
                .jobs
                .append_errors(job.id, &[RowError::for_job(message.clone())])
                .await?;
            stores
                .jobs
                .finish_job(job.id, JobStatus::Failed, 0, None)
                .await?;
            return Err(SubmitUploadError::Unreadable(message));
        }
    };

    stores
        .jobs
        .set_header_signature(job.id, &header_signature(&headers))
        .await?;

    match resolver.resolve(&headers).await? {
        MappingOutcome::Resolved(mapping) => {
            queue
                .enqueue(QueuedIngest {
                    job_id: job.id,
                    storage_path: command.storage_path,
                    source_file: command.source_file,
                    mapping: mapping.mapping,
                })
                .map_err(|_| SubmitUploadError::QueueUnavailable)?;

            Ok(SubmitUploadResponse::Processing {
                job_id: job.id,
                status: JobStatus::Processing,
            })
        }
        MappingOutcome::NeedsManualMapping { headers } => {
            Ok(SubmitUploadResponse::NeedsMapping {
                job_id: job.id,
                needs_mapping: true,
                headers,
            })
        }
    }
}
