//! Confirm manual mapping command
//!
//! The human-in-the-loop branch: the client submits explicit header
//! choices for a job that came back `needsMapping`. Confirmation upserts
//! the cache entry (idempotent re-confirmation) and enqueues ingestion.

use std::collections::BTreeMap;

use mediator::Request;
use serde::{Deserialize, Serialize};
use talentflow_ingest::mapping::CanonicalField;
use talentflow_ingest::reader;
use uuid::Uuid;

use crate::ingest::{IngestQueue, MappingResolver, QueuedIngest};
use crate::models::JobStatus;
use crate::store::{StoreError, Stores};

/// Command carrying the user's explicit header choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmMappingCommand {
    pub job_id: Uuid,
    /// Header to canonical field; `null` marks a deliberately unmapped
    /// column.
    pub mapping: BTreeMap<String, Option<CanonicalField>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmMappingResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfirmMappingError {
    #[error("upload job {0} not found")]
    JobNotFound(Uuid),

    #[error("upload job {job_id} is already {status}")]
    JobNotPending { job_id: Uuid, status: JobStatus },

    #[error("file could not be read: {0}")]
    Unreadable(String),

    #[error("ingestion queue is unavailable")]
    QueueUnavailable,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<ConfirmMappingResponse, ConfirmMappingError>> for ConfirmMappingCommand {}

pub async fn handle(
    stores: &Stores,
    resolver: &MappingResolver,
    queue: &IngestQueue,
    command: ConfirmMappingCommand,
) -> Result<ConfirmMappingResponse, ConfirmMappingError> {
    let job = stores
        .jobs
        .get_job(command.job_id)
        .await?
        .ok_or(ConfirmMappingError::JobNotFound(command.job_id))?;

    if job.status != JobStatus::Pending {
        return Err(ConfirmMappingError::JobNotPending {
            job_id: job.id,
            status: job.status,
        });
    }

    // Re-read headers from the stored file; the confirmed mapping is
    // cached under the actual header signature, not client-supplied data.
    let headers = reader::open_headers(&job.storage_path)
        .map_err(|e| ConfirmMappingError::Unreadable(e.to_string()))?;
    resolver.confirm(&headers, &command.mapping).await?;

    queue
        .enqueue(QueuedIngest {
            job_id: job.id,
            storage_path: job.storage_path,
            source_file: job.source_file,
            mapping: command.mapping,
        })
        .map_err(|_| ConfirmMappingError::QueueUnavailable)?;

    Ok(ConfirmMappingResponse {
        job_id: command.job_id,
        status: JobStatus::Processing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::NamedTempFile;

    use crate::features::uploads::commands::submit::{
        handle as submit, SubmitUploadCommand, SubmitUploadResponse,
    };
    use crate::store::JobStore;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn setup() -> (Stores, Arc<MappingResolver>, IngestQueue) {
        let stores = Stores::in_memory();
        let resolver = Arc::new(MappingResolver::new(stores.mappings.clone(), None));
        let queue = IngestQueue::start(stores.clone());
        (stores, resolver, queue)
    }

    #[tokio::test]
    async fn test_confirmation_enqueues_and_job_completes() {
        let (stores, resolver, queue) = setup();
        let file = csv_file("Col A,Col B\nasha@x.com,whatever\n");

        let response = submit(
            &stores,
            &resolver,
            &queue,
            SubmitUploadCommand {
                source_file: "odd.csv".to_string(),
                storage_path: file.path().to_str().unwrap().to_string(),
            },
        )
        .await
        .unwrap();
        let SubmitUploadResponse::NeedsMapping { job_id, .. } = response else {
            panic!("expected needs-mapping response");
        };

        let mut mapping = BTreeMap::new();
        mapping.insert("Col A".to_string(), Some(CanonicalField::Email));
        mapping.insert("Col B".to_string(), None);

        let confirmed = handle(
            &stores,
            &resolver,
            &queue,
            ConfirmMappingCommand { job_id, mapping },
        )
        .await
        .unwrap();
        assert_eq!(confirmed.status, JobStatus::Processing);

        for _ in 0..200 {
            let job = stores.jobs.get_job(job_id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                assert_eq!(job.status, JobStatus::Completed);
                assert_eq!(job.processed_rows, 1);
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_unknown_job_rejected() {
        let (stores, resolver, queue) = setup();
        let err = handle(
            &stores,
            &resolver,
            &queue,
            ConfirmMappingCommand {
                job_id: Uuid::new_v4(),
                mapping: BTreeMap::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConfirmMappingError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_terminal_job_rejected() {
        let (stores, resolver, queue) = setup();
        let file = csv_file("Name,Email\nAsha Rao,asha@x.com\n");

        let response = submit(
            &stores,
            &resolver,
            &queue,
            SubmitUploadCommand {
                source_file: "candidates.csv".to_string(),
                storage_path: file.path().to_str().unwrap().to_string(),
            },
        )
        .await
        .unwrap();
        let SubmitUploadResponse::Processing { job_id, .. } = response else {
            panic!("expected processing response");
        };

        for _ in 0..200 {
            let job = stores.jobs.get_job(job_id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = handle(
            &stores,
            &resolver,
            &queue,
            ConfirmMappingCommand {
                job_id,
                mapping: BTreeMap::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConfirmMappingError::JobNotPending { .. }));
    }
}
