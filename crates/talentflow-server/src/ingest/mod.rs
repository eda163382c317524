//! Server-side ingestion pipeline
//!
//! - **resolver**: cache-then-heuristics-then-oracle mapping resolution
//! - **engine**: the per-job batch ingestion run
//! - **queue**: single-worker sequencing of ingestion runs

pub mod engine;
pub mod queue;
pub mod resolver;

pub use engine::{RunSummary, ERROR_FLUSH_SIZE, INSERT_BATCH_SIZE, PROGRESS_INTERVAL};
pub use queue::{IngestQueue, QueuedIngest};
pub use resolver::{MappingOutcome, MappingResolver};
