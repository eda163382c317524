//! In-memory store backend
//!
//! Mirrors the Postgres backend's observable behavior (status transition
//! guards, frozen terminal jobs, unique candidate emails) so the ingestion
//! engine and queue can be exercised end to end in tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use talentflow_ingest::mapping::CanonicalField;
use uuid::Uuid;

use crate::models::{
    Candidate, HeaderMapping, JobStatus, MappingSource, NewCandidate, RowError, UploadJob,
    UploadJobSummary,
};

use super::{
    BatchInsertOutcome, CandidateFilter, CandidatePage, CandidateStore, InsertFailure, JobFilter,
    JobPage, JobStore, MappingStore, PageRequest, StoreError,
};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, UploadJob>,
    mappings: HashMap<String, HeaderMapping>,
    candidates: Vec<Candidate>,
    emails: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Artificial per-batch insert latency, used to observe interleaving.
    insert_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insert_delay(delay: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            insert_delay: Some(delay),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.lock().candidates.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &UploadJob) -> Result<(), StoreError> {
        self.lock().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<UploadJob>, StoreError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn set_header_signature(&self, id: Uuid, signature: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        job.header_signature = Some(signature.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn begin_processing(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        if job.status != JobStatus::Pending {
            return Err(StoreError::InvalidTransition {
                job_id: id,
                from: job.status,
                to: JobStatus::Processing,
            });
        }
        job.status = JobStatus::Processing;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update_progress(
        &self,
        id: Uuid,
        processed_rows: i64,
        total_rows: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        if job.status.is_terminal() {
            return Ok(());
        }
        job.processed_rows = processed_rows;
        if total_rows.is_some() {
            job.total_rows = total_rows;
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn append_errors(&self, id: Uuid, errors: &[RowError]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        if job.status.is_terminal() {
            return Ok(());
        }
        job.errors.extend_from_slice(errors);
        job.error_count += errors.len() as i64;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn finish_job(
        &self,
        id: Uuid,
        status: JobStatus,
        processed_rows: i64,
        total_rows: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        if job.status.is_terminal() {
            return Ok(());
        }
        job.status = status;
        job.processed_rows = processed_rows;
        if total_rows.is_some() {
            job.total_rows = total_rows;
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<JobPage, StoreError> {
        let inner = self.lock();

        let mut status_counts: BTreeMap<String, i64> = BTreeMap::new();
        for job in inner.jobs.values() {
            *status_counts
                .entry(job.status.as_str().to_string())
                .or_default() += 1;
        }

        let mut matching: Vec<&UploadJob> = inner
            .jobs
            .values()
            .filter(|job| filter.status.map(|s| job.status == s).unwrap_or(true))
            .filter(|job| {
                filter
                    .created_after
                    .map(|t| job.created_at >= t)
                    .unwrap_or(true)
            })
            .filter(|job| {
                filter
                    .created_before
                    .map(|t| job.created_at <= t)
                    .unwrap_or(true)
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let jobs = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(UploadJobSummary::from)
            .collect();

        Ok(JobPage {
            jobs,
            total,
            status_counts,
        })
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn find_by_signature(
        &self,
        signature: &str,
    ) -> Result<Option<HeaderMapping>, StoreError> {
        Ok(self.lock().mappings.get(signature).cloned())
    }

    async fn upsert_mapping(
        &self,
        signature: &str,
        original_headers: &[String],
        mapping: &BTreeMap<String, Option<CanonicalField>>,
        source: MappingSource,
    ) -> Result<HeaderMapping, StoreError> {
        let mut inner = self.lock();
        let now = Utc::now();
        let entry = inner
            .mappings
            .entry(signature.to_string())
            .and_modify(|existing| {
                existing.original_headers = original_headers.to_vec();
                existing.mapping = mapping.clone();
                existing.source = source;
                existing.updated_at = now;
            })
            .or_insert_with(|| HeaderMapping {
                id: Uuid::new_v4(),
                signature: signature.to_string(),
                original_headers: original_headers.to_vec(),
                mapping: mapping.clone(),
                source,
                created_at: now,
                updated_at: now,
            });
        Ok(entry.clone())
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn insert_batch(
        &self,
        candidates: &[NewCandidate],
    ) -> Result<BatchInsertOutcome, StoreError> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        let mut outcome = BatchInsertOutcome::default();
        for (index, candidate) in candidates.iter().enumerate() {
            if let Some(email) = &candidate.fields.email {
                if inner.emails.contains(email) {
                    outcome.failures.push(InsertFailure {
                        index,
                        message: format!("duplicate email '{email}'"),
                    });
                    continue;
                }
                inner.emails.insert(email.clone());
            }
            inner.candidates.push(Candidate {
                id: Uuid::new_v4(),
                fields: candidate.fields.clone(),
                raw_row: candidate.raw_row.clone(),
                source_file: candidate.source_file.clone(),
                upload_id: candidate.upload_id,
                created_at: Utc::now(),
            });
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: PageRequest,
    ) -> Result<CandidatePage, StoreError> {
        let inner = self.lock();
        let matching: Vec<&Candidate> = inner
            .candidates
            .iter()
            .filter(|c| filter.upload_id.map(|id| c.upload_id == id).unwrap_or(true))
            .filter(|c| {
                filter
                    .email
                    .as_ref()
                    .map(|email| c.fields.email.as_deref() == Some(email.as_str()))
                    .unwrap_or(true)
            })
            .collect();

        let total = matching.len() as i64;
        let candidates = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(CandidatePage { candidates, total })
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>, StoreError> {
        Ok(self.lock().candidates.iter().find(|c| c.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talentflow_ingest::CandidateFields;

    fn new_candidate(email: Option<&str>, upload_id: Uuid) -> NewCandidate {
        NewCandidate {
            fields: CandidateFields {
                email: email.map(|e| e.to_string()),
                ..CandidateFields::default()
            },
            raw_row: serde_json::json!({}),
            source_file: "test.csv".to_string(),
            upload_id,
        }
    }

    fn new_job() -> UploadJob {
        let now = Utc::now();
        UploadJob {
            id: Uuid::new_v4(),
            source_file: "test.csv".to_string(),
            storage_path: "/tmp/test.csv".to_string(),
            status: JobStatus::Pending,
            header_signature: None,
            total_rows: None,
            processed_rows: 0,
            error_count: 0,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_begin_processing_guards_transition() {
        let store = MemoryStore::new();
        let job = new_job();
        store.create_job(&job).await.unwrap();

        store.begin_processing(job.id).await.unwrap();
        let err = store.begin_processing(job.id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_terminal_jobs_are_frozen() {
        let store = MemoryStore::new();
        let job = new_job();
        store.create_job(&job).await.unwrap();
        store.begin_processing(job.id).await.unwrap();
        store
            .finish_job(job.id, JobStatus::Completed, 10, Some(10))
            .await
            .unwrap();

        store.update_progress(job.id, 99, None).await.unwrap();
        store
            .finish_job(job.id, JobStatus::Failed, 0, None)
            .await
            .unwrap();

        let job = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_rows, 10);
    }

    #[tokio::test]
    async fn test_insert_batch_reports_duplicates() {
        let store = MemoryStore::new();
        let upload = Uuid::new_v4();
        let outcome = store
            .insert_batch(&[
                new_candidate(Some("a@x.com"), upload),
                new_candidate(Some("a@x.com"), upload),
                new_candidate(Some("b@x.com"), upload),
                new_candidate(None, upload),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
    }

    #[tokio::test]
    async fn test_list_candidates_filters_by_upload() {
        let store = MemoryStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store
            .insert_batch(&[
                new_candidate(Some("a@x.com"), first),
                new_candidate(Some("b@x.com"), second),
            ])
            .await
            .unwrap();

        let page = store
            .list_candidates(
                &CandidateFilter {
                    upload_id: Some(first),
                    ..CandidateFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.candidates[0].upload_id, first);
    }

    #[tokio::test]
    async fn test_mapping_upsert_replaces() {
        let store = MemoryStore::new();
        let mut mapping = BTreeMap::new();
        mapping.insert("Email".to_string(), Some(CanonicalField::Email));

        let headers = vec!["Email".to_string(), "Phone".to_string()];
        let first = store
            .upsert_mapping("sig", &headers, &mapping, MappingSource::Heuristic)
            .await
            .unwrap();

        mapping.insert("Phone".to_string(), Some(CanonicalField::Phone));
        let second = store
            .upsert_mapping("sig", &headers, &mapping, MappingSource::Manual)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.source, MappingSource::Manual);
        assert_eq!(second.mapping.len(), 2);
    }
}
