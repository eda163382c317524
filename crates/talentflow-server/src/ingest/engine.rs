//! Batch ingestion engine
//!
//! Drives one job: stream rows off disk, normalize them, write candidates
//! in bounded batches and keep the persisted job record fresh enough for
//! polling clients. Row-level failures are recorded and skipped; anything
//! unrecoverable finishes the job as failed with whatever progress was
//! already flushed. A job never stays in `processing` after `run` returns.

use std::collections::BTreeMap;

use serde_json::Value;
use talentflow_ingest::mapping::CanonicalField;
use talentflow_ingest::normalize::normalize_row;
use talentflow_ingest::reader::SheetReader;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{JobStatus, NewCandidate, RowError};
use crate::store::{StoreError, Stores};

/// Candidate rows buffered before a store write.
pub const INSERT_BATCH_SIZE: usize = 250;

/// Row errors buffered before being appended to the job record.
pub const ERROR_FLUSH_SIZE: usize = 200;

/// Progress is persisted every this many rows seen.
pub const PROGRESS_INTERVAL: u64 = 250;

/// Final accounting for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub status: JobStatus,
    pub processed_rows: i64,
    pub error_count: i64,
    pub total_rows: i64,
}

struct JobState<'a> {
    stores: &'a Stores,
    job_id: Uuid,
    source_file: &'a str,
    processed: i64,
    rows_seen: i64,
    error_count: i64,
    batch: Vec<(u32, NewCandidate)>,
    error_buffer: Vec<RowError>,
}

impl<'a> JobState<'a> {
    fn new(stores: &'a Stores, job_id: Uuid, source_file: &'a str) -> Self {
        Self {
            stores,
            job_id,
            source_file,
            processed: 0,
            rows_seen: 0,
            error_count: 0,
            batch: Vec::with_capacity(INSERT_BATCH_SIZE),
            error_buffer: Vec::new(),
        }
    }

    async fn flush_batch(&mut self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let candidates: Vec<NewCandidate> = batch.iter().map(|(_, c)| c.clone()).collect();

        let outcome = self.stores.candidates.insert_batch(&candidates).await?;
        self.processed += outcome.inserted as i64;

        for failure in outcome.failures {
            let (row_number, candidate) = &batch[failure.index];
            self.error_count += 1;
            self.error_buffer.push(RowError::for_row(
                *row_number,
                failure.message,
                candidate.raw_row.clone(),
            ));
        }
        if self.error_buffer.len() >= ERROR_FLUSH_SIZE {
            self.flush_errors().await?;
        }
        Ok(())
    }

    async fn flush_errors(&mut self) -> Result<(), StoreError> {
        if self.error_buffer.is_empty() {
            return Ok(());
        }
        let errors = std::mem::take(&mut self.error_buffer);
        self.stores.jobs.append_errors(self.job_id, &errors).await
    }

    async fn persist_progress(&self) -> Result<(), StoreError> {
        self.stores
            .jobs
            .update_progress(self.job_id, self.processed, Some(self.rows_seen))
            .await
    }

    /// Abort the job: flush what is buffered, record the fatal error and
    /// finish as failed. Flush failures at this point are logged, not
    /// propagated, so the terminal status always lands.
    async fn fail(mut self, message: String) -> RunSummary {
        warn!(job_id = %self.job_id, source_file = self.source_file, message, "ingestion failed");
        self.error_buffer.push(RowError::for_job(message));
        self.error_count += 1;

        if let Err(e) = self.flush_batch().await {
            warn!(job_id = %self.job_id, error = %e, "failed to flush batch during abort");
        }
        if let Err(e) = self.flush_errors().await {
            warn!(job_id = %self.job_id, error = %e, "failed to flush errors during abort");
        }
        if let Err(e) = self
            .stores
            .jobs
            .finish_job(
                self.job_id,
                JobStatus::Failed,
                self.processed,
                Some(self.rows_seen),
            )
            .await
        {
            warn!(job_id = %self.job_id, error = %e, "failed to mark job failed");
        }
        RunSummary {
            status: JobStatus::Failed,
            processed_rows: self.processed,
            error_count: self.error_count,
            total_rows: self.rows_seen,
        }
    }

    async fn complete(mut self) -> Result<RunSummary, StoreError> {
        self.flush_batch().await?;
        self.flush_errors().await?;
        self.stores
            .jobs
            .finish_job(
                self.job_id,
                JobStatus::Completed,
                self.processed,
                Some(self.rows_seen),
            )
            .await?;
        info!(
            job_id = %self.job_id,
            processed = self.processed,
            total = self.rows_seen,
            errors = self.error_count,
            "ingestion completed"
        );
        Ok(RunSummary {
            status: JobStatus::Completed,
            processed_rows: self.processed,
            error_count: self.error_count,
            total_rows: self.rows_seen,
        })
    }
}

/// Run ingestion for one job.
///
/// The job must be `pending`; terminal and already-running jobs are
/// rejected with [`StoreError::InvalidTransition`] before any file I/O.
pub async fn run(
    stores: &Stores,
    job_id: Uuid,
    storage_path: &str,
    source_file: &str,
    mapping: &BTreeMap<String, Option<CanonicalField>>,
) -> Result<RunSummary, StoreError> {
    stores.jobs.begin_processing(job_id).await?;

    let mut state = JobState::new(stores, job_id, source_file);

    if mapping.values().all(|f| f.is_none()) {
        return Ok(state
            .fail("no usable header mapping for this job".to_string())
            .await);
    }

    let reader = match SheetReader::open(storage_path) {
        Ok(reader) => reader,
        Err(e) => {
            return Ok(state.fail(format!("failed to open spreadsheet: {e}")).await);
        }
    };
    let headers = reader.headers().to_vec();

    for row in reader {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                return Ok(state.fail(format!("stream aborted: {e}")).await);
            }
        };
        state.rows_seen += 1;

        let raw_map = row.to_map(&headers);
        let fields = normalize_row(&raw_map, mapping);
        let candidate = NewCandidate {
            fields,
            raw_row: Value::Object(raw_map),
            source_file: source_file.to_string(),
            upload_id: job_id,
        };
        state.batch.push((row.number, candidate));

        if state.batch.len() >= INSERT_BATCH_SIZE {
            if let Err(e) = state.flush_batch().await {
                return Ok(state.fail(format!("store write failed: {e}")).await);
            }
        }
        if state.rows_seen % PROGRESS_INTERVAL as i64 == 0 {
            if let Err(e) = state.persist_progress().await {
                return Ok(state.fail(format!("store write failed: {e}")).await);
            }
        }
    }

    state.complete().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use chrono::Utc;
    use tempfile::NamedTempFile;

    use crate::models::UploadJob;
    use crate::store::JobStore;
    use talentflow_ingest::mapping::resolve_headers;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    async fn pending_job(stores: &Stores, path: &str) -> UploadJob {
        let now = Utc::now();
        let job = UploadJob {
            id: Uuid::new_v4(),
            source_file: "candidates.csv".to_string(),
            storage_path: path.to_string(),
            status: JobStatus::Pending,
            header_signature: None,
            total_rows: None,
            processed_rows: 0,
            error_count: 0,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        stores.jobs.create_job(&job).await.unwrap();
        job
    }

    fn mapping_for(headers: &[&str]) -> BTreeMap<String, Option<CanonicalField>> {
        let headers: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
        resolve_headers(&headers).per_header
    }

    #[tokio::test]
    async fn test_happy_path_completes_with_counts() {
        let stores = Stores::in_memory();
        let file = csv_file("Name,Email\nAsha Rao,asha@x.com\nRavi Kumar,ravi@x.com\n");
        let job = pending_job(&stores, file.path().to_str().unwrap()).await;
        let mapping = mapping_for(&["Name", "Email"]);

        let summary = run(&stores, job.id, &job.storage_path, &job.source_file, &mapping)
            .await
            .unwrap();

        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.processed_rows, 2);
        assert_eq!(summary.error_count, 0);
        assert_eq!(summary.total_rows, 2);

        let stored = stores.jobs.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.processed_rows, 2);
        assert_eq!(stored.total_rows, Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_row_is_recorded_not_fatal() {
        let stores = Stores::in_memory();
        let file = csv_file(
            "Name,Email\nAsha Rao,asha@x.com\nAsha Again,asha@x.com\nRavi Kumar,ravi@x.com\n",
        );
        let job = pending_job(&stores, file.path().to_str().unwrap()).await;
        let mapping = mapping_for(&["Name", "Email"]);

        let summary = run(&stores, job.id, &job.storage_path, &job.source_file, &mapping)
            .await
            .unwrap();

        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.processed_rows, 2);
        assert_eq!(summary.error_count, 1);

        let stored = stores.jobs.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.error_count, 1);
        assert_eq!(stored.errors[0].row_number, Some(3));
        assert!(stored.errors[0].message.contains("duplicate email"));
    }

    #[tokio::test]
    async fn test_corrupt_row_fails_job_with_partial_progress() {
        let stores = Stores::in_memory();
        let mut contents = String::from("Name,Email\n");
        for i in 0..10 {
            contents.push_str(&format!("Person {i},p{i}@x.com\n"));
        }
        contents.push_str("Broken,row,with,too,many,columns\n");
        for i in 10..50 {
            contents.push_str(&format!("Person {i},p{i}@x.com\n"));
        }
        let file = csv_file(&contents);
        let job = pending_job(&stores, file.path().to_str().unwrap()).await;
        let mapping = mapping_for(&["Name", "Email"]);

        let summary = run(&stores, job.id, &job.storage_path, &job.source_file, &mapping)
            .await
            .unwrap();

        assert_eq!(summary.status, JobStatus::Failed);
        assert!(summary.processed_rows <= 10);

        let stored = stores.jobs.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored
            .errors
            .iter()
            .any(|e| e.row_number.is_none() && e.message.contains("stream aborted")));
    }

    #[tokio::test]
    async fn test_empty_mapping_fails_job() {
        let stores = Stores::in_memory();
        let file = csv_file("Col A,Col B\na,b\n");
        let job = pending_job(&stores, file.path().to_str().unwrap()).await;
        let mapping = mapping_for(&["Col A", "Col B"]);

        let summary = run(&stores, job.id, &job.storage_path, &job.source_file, &mapping)
            .await
            .unwrap();

        assert_eq!(summary.status, JobStatus::Failed);
        let stored = stores.jobs.get_job(job.id).await.unwrap().unwrap();
        assert!(stored.errors[0].message.contains("no usable header mapping"));
    }

    #[tokio::test]
    async fn test_terminal_job_rejects_reprocessing() {
        let stores = Stores::in_memory();
        let file = csv_file("Name,Email\nAsha Rao,asha@x.com\n");
        let job = pending_job(&stores, file.path().to_str().unwrap()).await;
        let mapping = mapping_for(&["Name", "Email"]);

        run(&stores, job.id, &job.storage_path, &job.source_file, &mapping)
            .await
            .unwrap();
        let err = run(&stores, job.id, &job.storage_path, &job.source_file, &mapping)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_raw_row_snapshot_preserved() {
        let stores = Stores::in_memory();
        let file = csv_file("Name,Email,Notes\nAsha Rao,asha@x.com,manual review\n");
        let job = pending_job(&stores, file.path().to_str().unwrap()).await;
        let mapping = mapping_for(&["Name", "Email", "Notes"]);

        run(&stores, job.id, &job.storage_path, &job.source_file, &mapping)
            .await
            .unwrap();

        let page = stores
            .candidates
            .list_candidates(&Default::default(), Default::default())
            .await
            .unwrap();
        let candidate = &page.candidates[0];
        assert_eq!(candidate.raw_row["Notes"], "manual review");
        assert_eq!(candidate.upload_id, job.id);
        assert_eq!(candidate.fields.first_name.as_deref(), Some("Asha"));
    }
}
