//! Candidate feature slice
//!
//! Read-side access to candidates produced by the ingestion pipeline.

pub mod queries;
pub mod routes;

pub use routes::candidate_routes;
