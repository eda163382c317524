//! List candidates query

use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};
use crate::models::Candidate;
use crate::store::{CandidateFilter, CandidateStore, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCandidatesQuery {
    pub upload_id: Option<Uuid>,
    pub email: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCandidatesResponse {
    pub candidates: Vec<Candidate>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListCandidatesError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<ListCandidatesResponse, ListCandidatesError>> for ListCandidatesQuery {}

pub async fn handle(
    candidates: &dyn CandidateStore,
    query: ListCandidatesQuery,
) -> Result<ListCandidatesResponse, ListCandidatesError> {
    let page = query.pagination.to_page_request();
    let filter = CandidateFilter {
        upload_id: query.upload_id,
        email: query.email.map(|e| e.trim().to_lowercase()),
    };

    let result = candidates.list_candidates(&filter, page).await?;
    let pagination = PaginationMetadata::new(page.page, page.limit, result.total);

    Ok(ListCandidatesResponse {
        candidates: result.candidates,
        pagination,
    })
}
