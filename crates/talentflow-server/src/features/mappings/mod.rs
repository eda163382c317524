//! Header mapping feature slice
//!
//! Exposes dry-run mapping suggestions so a client can preview how a set of
//! spreadsheet headers will resolve before uploading the file.

pub mod commands;
pub mod routes;

pub use routes::mapping_routes;
