//! Storage abstraction
//!
//! All persistence goes through the three repository traits here. The
//! production backend is Postgres; an in-memory backend backs the engine
//! and queue tests so the whole pipeline can run without a database.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use talentflow_ingest::mapping::CanonicalField;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Candidate, HeaderMapping, JobStatus, MappingSource, NewCandidate, RowError, UploadJob,
    UploadJobSummary,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

/// One row of a batch that the store refused to insert.
#[derive(Debug, Clone)]
pub struct InsertFailure {
    /// Index into the submitted batch.
    pub index: usize,
    pub message: String,
}

/// What actually happened to a batch insert.
///
/// Row-level rejections (constraint violations) land in `failures` while
/// the rest of the batch still commits; only infrastructure failures
/// surface as a `StoreError` from the call itself.
#[derive(Debug, Default)]
pub struct BatchInsertOutcome {
    pub inserted: usize,
    pub failures: Vec<InsertFailure>,
}

/// Filters for listing upload jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Simple page/limit pagination for store queries.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// A page of upload jobs plus aggregate status counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    pub jobs: Vec<UploadJobSummary>,
    pub total: i64,
    pub status_counts: BTreeMap<String, i64>,
}

/// Filters for listing candidates.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub upload_id: Option<Uuid>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePage {
    pub candidates: Vec<Candidate>,
    pub total: i64,
}

/// Upload job persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &UploadJob) -> Result<(), StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<UploadJob>, StoreError>;

    async fn set_header_signature(&self, id: Uuid, signature: &str) -> Result<(), StoreError>;

    /// Move a pending job to processing. Any other starting state is an
    /// [`StoreError::InvalidTransition`].
    async fn begin_processing(&self, id: Uuid) -> Result<(), StoreError>;

    async fn update_progress(
        &self,
        id: Uuid,
        processed_rows: i64,
        total_rows: Option<i64>,
    ) -> Result<(), StoreError>;

    /// Append errors to the job's error list and bump its error count.
    async fn append_errors(&self, id: Uuid, errors: &[RowError]) -> Result<(), StoreError>;

    /// Set the job's terminal status with final counters. Jobs already in
    /// a terminal state are left untouched.
    async fn finish_job(
        &self,
        id: Uuid,
        status: JobStatus,
        processed_rows: i64,
        total_rows: Option<i64>,
    ) -> Result<(), StoreError>;

    async fn list_jobs(&self, filter: &JobFilter, page: PageRequest)
        -> Result<JobPage, StoreError>;
}

/// Header mapping cache persistence.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_by_signature(
        &self,
        signature: &str,
    ) -> Result<Option<HeaderMapping>, StoreError>;

    /// Idempotent overwrite keyed by signature: re-confirming the same
    /// header set replaces the cached mapping, never duplicates it.
    async fn upsert_mapping(
        &self,
        signature: &str,
        original_headers: &[String],
        mapping: &BTreeMap<String, Option<CanonicalField>>,
        source: MappingSource,
    ) -> Result<HeaderMapping, StoreError>;
}

/// Candidate record persistence.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Insert a batch, tolerating per-row rejections.
    async fn insert_batch(
        &self,
        candidates: &[NewCandidate],
    ) -> Result<BatchInsertOutcome, StoreError>;

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: PageRequest,
    ) -> Result<CandidatePage, StoreError>;

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>, StoreError>;
}

/// The three repositories bundled for handler wiring.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub mappings: Arc<dyn MappingStore>,
    pub candidates: Arc<dyn CandidateStore>,
}

impl Stores {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self {
            jobs: store.clone(),
            mappings: store.clone(),
            candidates: store,
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            jobs: store.clone(),
            mappings: store.clone(),
            candidates: store,
        }
    }
}
