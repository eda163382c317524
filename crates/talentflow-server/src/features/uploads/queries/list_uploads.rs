//! List uploads query

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};
use crate::models::{JobStatus, UploadJobSummary};
use crate::store::{JobFilter, StoreError, Stores};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListUploadsQuery {
    /// Filter by job status ("pending", "processing", "completed",
    /// "failed").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Only jobs created at or after this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,

    /// Only jobs created at or before this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUploadsResponse {
    pub jobs: Vec<UploadJobSummary>,
    pub pagination: PaginationMetadata,
    /// Aggregate job counts by status across all jobs, not just this page.
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListUploadsError {
    #[error("invalid status filter: {0}")]
    InvalidStatus(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<ListUploadsResponse, ListUploadsError>> for ListUploadsQuery {}

pub async fn handle(
    stores: &Stores,
    query: ListUploadsQuery,
) -> Result<ListUploadsResponse, ListUploadsError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<JobStatus>()
                .map_err(|_| ListUploadsError::InvalidStatus(s.to_string()))
        })
        .transpose()?;

    let filter = JobFilter {
        status,
        created_after: query.created_after,
        created_before: query.created_before,
    };
    let page = stores
        .jobs
        .list_jobs(&filter, query.pagination.to_page_request())
        .await?;

    Ok(ListUploadsResponse {
        pagination: PaginationMetadata::from_params(&query.pagination, page.total),
        jobs: page.jobs,
        by_status: page.status_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::UploadJob;
    use crate::store::JobStore;

    async fn seed_job(stores: &Stores, status: JobStatus) {
        let now = Utc::now();
        let job = UploadJob {
            id: Uuid::new_v4(),
            source_file: "seed.csv".to_string(),
            storage_path: "/tmp/seed.csv".to_string(),
            status,
            header_signature: None,
            total_rows: None,
            processed_rows: 0,
            error_count: 0,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        stores.jobs.create_job(&job).await.unwrap();
    }

    #[tokio::test]
    async fn test_filter_and_aggregate_counts() {
        let stores = Stores::in_memory();
        seed_job(&stores, JobStatus::Completed).await;
        seed_job(&stores, JobStatus::Completed).await;
        seed_job(&stores, JobStatus::Failed).await;

        let response = handle(
            &stores,
            ListUploadsQuery {
                status: Some("completed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(response.jobs.len(), 2);
        assert_eq!(response.pagination.total, 2);
        assert_eq!(response.by_status["completed"], 2);
        assert_eq!(response.by_status["failed"], 1);
    }

    #[tokio::test]
    async fn test_date_range_filter() {
        let stores = Stores::in_memory();
        seed_job(&stores, JobStatus::Completed).await;

        let response = handle(
            &stores,
            ListUploadsQuery {
                created_after: Some(Utc::now() + chrono::Duration::hours(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(response.jobs.is_empty());

        let response = handle(
            &stores,
            ListUploadsQuery {
                created_before: Some(Utc::now() + chrono::Duration::hours(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(response.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_status_rejected() {
        let stores = Stores::in_memory();
        let err = handle(
            &stores,
            ListUploadsQuery {
                status: Some("done".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ListUploadsError::InvalidStatus(_)));
    }
}
