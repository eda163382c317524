//! Postgres store backend
//!
//! Queries are built at runtime (`query_as` / `QueryBuilder`) rather than
//! through the compile-time macros, so the crate builds without a live
//! database. Candidate uniqueness is enforced by a partial unique index on
//! email; batch inserts catch that violation per row instead of aborting
//! the batch.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder, Row};
use talentflow_ingest::mapping::CanonicalField;
use talentflow_ingest::CandidateFields;
use uuid::Uuid;

use crate::models::{
    Candidate, HeaderMapping, JobStatus, MappingSource, NewCandidate, RowError, UploadJob,
    UploadJobSummary,
};

use super::{
    BatchInsertOutcome, CandidateFilter, CandidatePage, CandidateStore, InsertFailure, JobFilter,
    JobPage, JobStore, MappingStore, PageRequest, StoreError,
};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_error(message: String) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(message.into()))
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    source_file: String,
    storage_path: String,
    status: String,
    header_signature: Option<String>,
    total_rows: Option<i64>,
    processed_rows: i64,
    error_count: i64,
    errors: Json<Vec<RowError>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<UploadJob, StoreError> {
        Ok(UploadJob {
            id: self.id,
            source_file: self.source_file,
            storage_path: self.storage_path,
            status: self.status.parse().map_err(decode_error)?,
            header_signature: self.header_signature,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            error_count: self.error_count,
            errors: self.errors.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobSummaryRow {
    id: Uuid,
    source_file: String,
    status: String,
    total_rows: Option<i64>,
    processed_rows: i64,
    error_count: i64,
    created_at: DateTime<Utc>,
}

impl JobSummaryRow {
    fn into_summary(self) -> Result<UploadJobSummary, StoreError> {
        Ok(UploadJobSummary {
            id: self.id,
            source_file: self.source_file,
            status: self.status.parse().map_err(decode_error)?,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            error_count: self.error_count,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MappingRow {
    id: Uuid,
    signature: String,
    original_headers: Json<Vec<String>>,
    mapping: Json<BTreeMap<String, Option<CanonicalField>>>,
    source: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MappingRow {
    fn into_mapping(self) -> Result<HeaderMapping, StoreError> {
        Ok(HeaderMapping {
            id: self.id,
            signature: self.signature,
            original_headers: self.original_headers.0,
            mapping: self.mapping.0,
            source: self.source.parse().map_err(decode_error)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    experience_years: Option<f64>,
    skills: Vec<String>,
    location: Option<String>,
    current_company: Option<String>,
    designation: Option<String>,
    raw_row: Json<serde_json::Value>,
    source_file: String,
    upload_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            id: row.id,
            fields: CandidateFields {
                first_name: row.first_name,
                last_name: row.last_name,
                full_name: row.full_name,
                email: row.email,
                phone: row.phone,
                experience_years: row.experience_years,
                skills: row.skills,
                location: row.location,
                current_company: row.current_company,
                designation: row.designation,
            },
            raw_row: row.raw_row.0,
            source_file: row.source_file,
            upload_id: row.upload_id,
            created_at: row.created_at,
        }
    }
}

const JOB_COLUMNS: &str = "id, source_file, storage_path, status, header_signature, total_rows, \
                           processed_rows, error_count, errors, created_at, updated_at";

const CANDIDATE_COLUMNS: &str = "id, first_name, last_name, full_name, email, phone, \
                                 experience_years, skills, location, current_company, \
                                 designation, raw_row, source_file, upload_id, created_at";

#[async_trait]
impl JobStore for PostgresStore {
    async fn create_job(&self, job: &UploadJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO upload_jobs
                (id, source_file, storage_path, status, header_signature, total_rows,
                 processed_rows, error_count, errors, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(job.id)
        .bind(&job.source_file)
        .bind(&job.storage_path)
        .bind(job.status.as_str())
        .bind(&job.header_signature)
        .bind(job.total_rows)
        .bind(job.processed_rows)
        .bind(job.error_count)
        .bind(Json(&job.errors))
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<UploadJob>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM upload_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(JobRow::into_job).transpose()
    }

    async fn set_header_signature(&self, id: Uuid, signature: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE upload_jobs SET header_signature = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(signature)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("job {id}")));
        }
        Ok(())
    }

    async fn begin_processing(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE upload_jobs SET status = 'processing', updated_at = now() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let job = self
                .get_job(id)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
            return Err(StoreError::InvalidTransition {
                job_id: id,
                from: job.status,
                to: JobStatus::Processing,
            });
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        id: Uuid,
        processed_rows: i64,
        total_rows: Option<i64>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE upload_jobs \
             SET processed_rows = $2, total_rows = COALESCE($3, total_rows), updated_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(id)
        .bind(processed_rows)
        .bind(total_rows)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_errors(&self, id: Uuid, errors: &[RowError]) -> Result<(), StoreError> {
        if errors.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "UPDATE upload_jobs \
             SET errors = errors || $2::jsonb, error_count = error_count + $3, \
                 updated_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(id)
        .bind(Json(errors))
        .bind(errors.len() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish_job(
        &self,
        id: Uuid,
        status: JobStatus,
        processed_rows: i64,
        total_rows: Option<i64>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE upload_jobs \
             SET status = $2, processed_rows = $3, total_rows = COALESCE($4, total_rows), \
                 updated_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(processed_rows)
        .bind(total_rows)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<JobPage, StoreError> {
        let mut query = QueryBuilder::new(
            "SELECT id, source_file, status, total_rows, processed_rows, error_count, \
             created_at FROM upload_jobs WHERE 1=1",
        );
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM upload_jobs WHERE 1=1");

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
            count_query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(after) = filter.created_after {
            query.push(" AND created_at >= ").push_bind(after);
            count_query.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = filter.created_before {
            query.push(" AND created_at <= ").push_bind(before);
            count_query.push(" AND created_at <= ").push_bind(before);
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<JobSummaryRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let jobs = rows
            .into_iter()
            .map(JobSummaryRow::into_summary)
            .collect::<Result<Vec<_>, _>>()?;

        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let count_rows =
            sqlx::query("SELECT status, COUNT(*) AS count FROM upload_jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let mut status_counts = BTreeMap::new();
        for row in count_rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            status_counts.insert(status, count);
        }

        Ok(JobPage {
            jobs,
            total,
            status_counts,
        })
    }
}

#[async_trait]
impl MappingStore for PostgresStore {
    async fn find_by_signature(
        &self,
        signature: &str,
    ) -> Result<Option<HeaderMapping>, StoreError> {
        let row = sqlx::query_as::<_, MappingRow>(
            "SELECT id, signature, original_headers, mapping, source, created_at, updated_at \
             FROM header_mappings WHERE signature = $1",
        )
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MappingRow::into_mapping).transpose()
    }

    async fn upsert_mapping(
        &self,
        signature: &str,
        original_headers: &[String],
        mapping: &BTreeMap<String, Option<CanonicalField>>,
        source: MappingSource,
    ) -> Result<HeaderMapping, StoreError> {
        let row = sqlx::query_as::<_, MappingRow>(
            r#"
            INSERT INTO header_mappings
                (id, signature, original_headers, mapping, source, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            ON CONFLICT (signature) DO UPDATE
                SET original_headers = EXCLUDED.original_headers,
                    mapping = EXCLUDED.mapping,
                    source = EXCLUDED.source,
                    updated_at = now()
            RETURNING id, signature, original_headers, mapping, source, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(signature)
        .bind(Json(original_headers))
        .bind(Json(mapping))
        .bind(source.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.into_mapping()
    }
}

#[async_trait]
impl CandidateStore for PostgresStore {
    async fn insert_batch(
        &self,
        candidates: &[NewCandidate],
    ) -> Result<BatchInsertOutcome, StoreError> {
        let mut outcome = BatchInsertOutcome::default();

        // Row-at-a-time so one constraint violation does not poison the
        // rest of the batch.
        for (index, candidate) in candidates.iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO candidates
                    (id, first_name, last_name, full_name, email, phone, experience_years,
                     skills, location, current_company, designation, raw_row, source_file,
                     upload_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&candidate.fields.first_name)
            .bind(&candidate.fields.last_name)
            .bind(&candidate.fields.full_name)
            .bind(&candidate.fields.email)
            .bind(&candidate.fields.phone)
            .bind(candidate.fields.experience_years)
            .bind(&candidate.fields.skills)
            .bind(&candidate.fields.location)
            .bind(&candidate.fields.current_company)
            .bind(&candidate.fields.designation)
            .bind(Json(&candidate.raw_row))
            .bind(&candidate.source_file)
            .bind(candidate.upload_id)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => outcome.inserted += 1,
                Err(sqlx::Error::Database(db_error)) => {
                    outcome.failures.push(InsertFailure {
                        index,
                        message: db_error.message().to_string(),
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }
        Ok(outcome)
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: PageRequest,
    ) -> Result<CandidatePage, StoreError> {
        let mut query =
            QueryBuilder::new(format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE 1=1"));
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM candidates WHERE 1=1");

        if let Some(upload_id) = filter.upload_id {
            query.push(" AND upload_id = ").push_bind(upload_id);
            count_query.push(" AND upload_id = ").push_bind(upload_id);
        }
        if let Some(email) = &filter.email {
            query.push(" AND email = ").push_bind(email);
            count_query.push(" AND email = ").push_bind(email);
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<CandidateRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(CandidatePage {
            candidates: rows.into_iter().map(Candidate::from).collect(),
            total,
        })
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>, StoreError> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Candidate::from))
    }
}
