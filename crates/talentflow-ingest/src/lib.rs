//! TalentFlow Ingest Library
//!
//! Spreadsheet ingestion primitives for the candidate tracker:
//!
//! - **reader**: forward-only streaming access to CSV/XLSX files
//! - **mapping**: canonical candidate fields and heuristic header resolution
//! - **normalize**: pure per-row normalization into canonical fields
//! - **oracle**: pluggable remote mapping-suggestion client
//!
//! Everything here is storage-agnostic; the server crate wires these
//! primitives to the job store and the batch ingestion engine.
//!
//! # Example
//!
//! ```no_run
//! use talentflow_ingest::{mapping, normalize, reader::SheetReader};
//!
//! fn main() -> anyhow::Result<()> {
//!     let sheet = SheetReader::open("candidates.csv")?;
//!     let headers = sheet.headers().to_vec();
//!     let resolution = mapping::resolve_headers(&headers);
//!     for row in sheet {
//!         let row = row?;
//!         let raw = row.to_map(&headers);
//!         let fields = normalize::normalize_row(&raw, &resolution.per_header);
//!         println!("{fields:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod mapping;
pub mod normalize;
pub mod oracle;
pub mod reader;

pub use mapping::{CanonicalField, HeaderResolution};
pub use normalize::CandidateFields;
pub use reader::{open_headers, RawRow, ReaderError, SheetFormat, SheetReader};
