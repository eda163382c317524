//! Domain models shared across features and stores

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use talentflow_ingest::mapping::CanonicalField;
use talentflow_ingest::CandidateFields;
use uuid::Uuid;

/// Lifecycle states of an upload job.
///
/// `Completed` and `Failed` are terminal; a terminal job never changes
/// state again and its error list is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// One recorded ingestion error.
///
/// `row_number` is absent for job-level errors (corrupt file, empty
/// mapping); row-level errors carry the physical row number and the raw
/// row payload for later inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_number: Option<u32>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_row: Option<Value>,
}

impl RowError {
    pub fn for_row(row_number: u32, message: impl Into<String>, raw_row: Value) -> Self {
        Self {
            row_number: Some(row_number),
            message: message.into(),
            raw_row: Some(raw_row),
        }
    }

    pub fn for_job(message: impl Into<String>) -> Self {
        Self {
            row_number: None,
            message: message.into(),
            raw_row: None,
        }
    }
}

/// An upload job tracking one spreadsheet through ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJob {
    pub id: Uuid,
    pub source_file: String,
    /// Where the uploaded file was saved on disk.
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<i64>,
    pub processed_rows: i64,
    pub error_count: i64,
    pub errors: Vec<RowError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trimmed job view for list endpoints, without the error payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJobSummary {
    pub id: Uuid,
    pub source_file: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<i64>,
    pub processed_rows: i64,
    pub error_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&UploadJob> for UploadJobSummary {
    fn from(job: &UploadJob) -> Self {
        Self {
            id: job.id,
            source_file: job.source_file.clone(),
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            error_count: job.error_count,
            created_at: job.created_at,
        }
    }
}

/// How a cached header mapping was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingSource {
    Heuristic,
    Oracle,
    Manual,
}

impl MappingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingSource::Heuristic => "heuristic",
            MappingSource::Oracle => "oracle",
            MappingSource::Manual => "manual",
        }
    }
}

impl FromStr for MappingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heuristic" => Ok(MappingSource::Heuristic),
            "oracle" => Ok(MappingSource::Oracle),
            "manual" => Ok(MappingSource::Manual),
            other => Err(format!("unknown mapping source '{other}'")),
        }
    }
}

/// A cached header-to-field mapping, keyed by header signature.
///
/// Any spreadsheet whose (order-insensitive) header set hashes to the same
/// signature reuses this mapping without re-resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderMapping {
    pub id: Uuid,
    pub signature: String,
    /// The headers in the order they were first seen.
    pub original_headers: Vec<String>,
    pub mapping: BTreeMap<String, Option<CanonicalField>>,
    pub source: MappingSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored candidate record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: CandidateFields,
    /// The original row as uploaded, untouched by normalization.
    pub raw_row: Value,
    pub source_file: String,
    pub upload_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A candidate record ready for insertion.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub fields: CandidateFields,
    pub raw_row: Value,
    pub source_file: String,
    pub upload_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_row_error_serialization_shape() {
        let row = RowError::for_row(7, "duplicate email", serde_json::json!({"Email": "a@x.com"}));
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["rowNumber"], 7);
        assert_eq!(value["message"], "duplicate email");

        let job = RowError::for_job("mapping is empty");
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("rowNumber").is_none());
    }
}
