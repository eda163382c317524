//! Mapping routes

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::AppError;
use crate::features::FeatureState;

use super::commands::suggest::{
    handle as handle_suggest, SuggestMappingCommand, SuggestMappingError, SuggestMappingResponse,
};

pub fn mapping_routes() -> Router<FeatureState> {
    Router::new().route("/suggest", post(suggest_mapping))
}

impl From<SuggestMappingError> for AppError {
    fn from(err: SuggestMappingError) -> Self {
        match err {
            SuggestMappingError::NoHeaders => AppError::Validation(err.to_string()),
            SuggestMappingError::Store(err) => err.into(),
        }
    }
}

async fn suggest_mapping(
    State(state): State<FeatureState>,
    Json(command): Json<SuggestMappingCommand>,
) -> Result<Json<SuggestMappingResponse>, AppError> {
    let response = handle_suggest(&state.resolver, command).await?;
    Ok(Json(response))
}
