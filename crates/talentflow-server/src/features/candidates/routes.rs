//! Candidate routes

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::error::AppError;
use crate::features::FeatureState;
use crate::models::Candidate;

use super::queries::get::{handle as handle_get, GetCandidateError, GetCandidateQuery};
use super::queries::list::{
    handle as handle_list, ListCandidatesError, ListCandidatesQuery, ListCandidatesResponse,
};

pub fn candidate_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list_candidates))
        .route("/:candidate_id", get(get_candidate))
}

impl From<ListCandidatesError> for AppError {
    fn from(err: ListCandidatesError) -> Self {
        match err {
            ListCandidatesError::Store(err) => err.into(),
        }
    }
}

impl From<GetCandidateError> for AppError {
    fn from(err: GetCandidateError) -> Self {
        match err {
            GetCandidateError::NotFound(id) => AppError::NotFound(format!("Candidate {id}")),
            GetCandidateError::Store(err) => err.into(),
        }
    }
}

async fn list_candidates(
    State(state): State<FeatureState>,
    Query(query): Query<ListCandidatesQuery>,
) -> Result<Json<ListCandidatesResponse>, AppError> {
    let response = handle_list(state.stores.candidates.as_ref(), query).await?;
    Ok(Json(response))
}

async fn get_candidate(
    State(state): State<FeatureState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<Candidate>, AppError> {
    let candidate = handle_get(
        state.stores.candidates.as_ref(),
        GetCandidateQuery { candidate_id },
    )
    .await?;
    Ok(Json(candidate))
}
