//! TalentFlow Server Library
//!
//! HTTP server for bulk recruitment candidate ingestion.
//!
//! # Overview
//!
//! The TalentFlow server provides a REST API for importing candidate
//! spreadsheets:
//!
//! - **Upload pipeline**: CSV and XLSX ingestion with header mapping
//! - **Header mappings**: Cached, heuristic, and oracle-assisted mapping
//! - **Candidates**: Read access to normalized candidate records
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Configuration**: Environment-based configuration management
//!
//! # Architecture
//!
//! The server follows a **CQRS (Command Query Responsibility Segregation)**
//! architecture:
//!
//! - **Commands** (Write Operations): Submit upload, confirm mapping
//! - **Queries** (Read Operations): Job status, upload listing, candidates
//!
//! Each feature lives in its own vertical slice under [`features`], with the
//! shared ingestion engine in [`ingest`] and storage behind the trait objects
//! in [`store`].

pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod store;
