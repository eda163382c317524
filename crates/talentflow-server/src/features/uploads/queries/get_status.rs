//! Upload status query
//!
//! The polling endpoint: status, live counters and a capped slice of the
//! recorded errors.

use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{JobStatus, RowError};
use crate::store::{StoreError, Stores};

/// Only this many error entries are returned to the client, however many
/// were recorded.
pub const MAX_ERRORS_RETURNED: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUploadStatusQuery {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub job_id: Uuid,
    pub source_file: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<i64>,
    pub processed_rows: i64,
    pub error_count: i64,
    pub errors: Vec<RowError>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetUploadStatusError {
    #[error("upload job {0} not found")]
    JobNotFound(Uuid),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<UploadStatusResponse, GetUploadStatusError>> for GetUploadStatusQuery {}

pub async fn handle(
    stores: &Stores,
    query: GetUploadStatusQuery,
) -> Result<UploadStatusResponse, GetUploadStatusError> {
    let job = stores
        .jobs
        .get_job(query.job_id)
        .await?
        .ok_or(GetUploadStatusError::JobNotFound(query.job_id))?;

    let mut errors = job.errors;
    errors.truncate(MAX_ERRORS_RETURNED);

    Ok(UploadStatusResponse {
        job_id: job.id,
        source_file: job.source_file,
        status: job.status,
        total_rows: job.total_rows,
        processed_rows: job.processed_rows,
        error_count: job.error_count,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::UploadJob;
    use crate::store::JobStore;

    #[tokio::test]
    async fn test_errors_are_capped() {
        let stores = Stores::in_memory();
        let now = Utc::now();
        let job = UploadJob {
            id: Uuid::new_v4(),
            source_file: "big.csv".to_string(),
            storage_path: "/tmp/big.csv".to_string(),
            status: JobStatus::Processing,
            header_signature: None,
            total_rows: Some(500),
            processed_rows: 300,
            error_count: 0,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        stores.jobs.create_job(&job).await.unwrap();

        let errors: Vec<RowError> = (0..120)
            .map(|i| RowError::for_row(i + 2, "bad row", serde_json::json!({})))
            .collect();
        stores.jobs.append_errors(job.id, &errors).await.unwrap();

        let response = handle(&stores, GetUploadStatusQuery { job_id: job.id })
            .await
            .unwrap();
        assert_eq!(response.error_count, 120);
        assert_eq!(response.errors.len(), MAX_ERRORS_RETURNED);
        assert_eq!(response.processed_rows, 300);
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let stores = Stores::in_memory();
        let err = handle(
            &stores,
            GetUploadStatusQuery {
                job_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GetUploadStatusError::JobNotFound(_)));
    }
}
