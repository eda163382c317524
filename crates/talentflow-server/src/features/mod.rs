//! Feature modules implementing the TalentFlow API
//!
//! This module contains all feature slices following the CQRS (Command Query
//! Responsibility Segregation) pattern. Each feature is organized as a
//! vertical slice with its own commands, queries, and routes.
//!
//! # Features
//!
//! - **uploads**: Spreadsheet upload submission and job status tracking
//! - **mappings**: Header mapping suggestion and confirmation
//! - **candidates**: Read access to candidates produced by ingestion
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations (submit, confirm)
//! - `queries/` - Read operations (get, list)
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement the mediator pattern using the `mediator`
//! crate, enabling clean separation of concerns and easy testing.

pub mod candidates;
pub mod mappings;
pub mod shared;
pub mod uploads;

use std::sync::Arc;

use axum::Router;

use crate::config::UploadConfig;
use crate::ingest::{IngestQueue, MappingResolver};
use crate::store::Stores;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Persistence backends for jobs, mappings, and candidates
    pub stores: Stores,
    /// Header mapping resolution chain (cache, heuristics, oracle)
    pub resolver: Arc<MappingResolver>,
    /// Background ingestion queue
    pub queue: IngestQueue,
    /// Upload directory and size limits
    pub uploads: UploadConfig,
}

/// Creates the main API router with all feature routes mounted
///
/// Each feature is mounted under its own path prefix:
/// - `/upload` - Spreadsheet submission and mapping confirmation
/// - `/uploads` - Upload job listing and status
/// - `/mappings` - Header mapping suggestions
/// - `/candidates` - Candidate listing and retrieval
pub fn router(state: FeatureState) -> Router<()> {
    let max_file_bytes = state.uploads.max_file_bytes;
    Router::new()
        .nest(
            "/upload",
            uploads::upload_routes(max_file_bytes).with_state(state.clone()),
        )
        .nest(
            "/uploads",
            uploads::uploads_routes().with_state(state.clone()),
        )
        .nest(
            "/mappings",
            mappings::mapping_routes().with_state(state.clone()),
        )
        .nest(
            "/candidates",
            candidates::candidate_routes().with_state(state),
        )
}
