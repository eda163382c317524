//! Upload feature slice
//!
//! Submission, manual mapping confirmation and status polling for bulk
//! spreadsheet uploads.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::{upload_routes, uploads_routes};
