//! Get candidate query

use mediator::Request;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Candidate;
use crate::store::{CandidateStore, StoreError};

#[derive(Debug, Clone, Deserialize)]
pub struct GetCandidateQuery {
    pub candidate_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetCandidateError {
    #[error("Candidate not found: {0}")]
    NotFound(Uuid),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl Request<Result<Candidate, GetCandidateError>> for GetCandidateQuery {}

pub async fn handle(
    candidates: &dyn CandidateStore,
    query: GetCandidateQuery,
) -> Result<Candidate, GetCandidateError> {
    candidates
        .get_candidate(query.candidate_id)
        .await
        .map_err(GetCandidateError::Store)?
        .ok_or(GetCandidateError::NotFound(query.candidate_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use talentflow_ingest::normalize::CandidateFields;

    use crate::models::NewCandidate;
    use crate::store::Stores;

    #[tokio::test]
    async fn test_get_returns_stored_candidate() {
        let stores = Stores::in_memory();
        let upload_id = Uuid::new_v4();
        stores
            .candidates
            .insert_batch(&[NewCandidate {
                fields: CandidateFields {
                    email: Some("a@example.com".to_string()),
                    ..Default::default()
                },
                raw_row: json!({"Email": "a@example.com"}),
                source_file: "roster.csv".to_string(),
                upload_id,
            }])
            .await
            .unwrap();

        let listed = stores
            .candidates
            .list_candidates(&Default::default(), crate::store::PageRequest::new(1, 10))
            .await
            .unwrap();
        let id = listed.candidates[0].id;

        let candidate = handle(
            stores.candidates.as_ref(),
            GetCandidateQuery { candidate_id: id },
        )
        .await
        .unwrap();
        assert_eq!(candidate.fields.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn test_missing_candidate_not_found() {
        let stores = Stores::in_memory();
        let missing = Uuid::new_v4();
        let err = handle(
            stores.candidates.as_ref(),
            GetCandidateQuery {
                candidate_id: missing,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GetCandidateError::NotFound(id) if id == missing));
    }
}
