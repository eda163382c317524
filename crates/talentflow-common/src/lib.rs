//! TalentFlow Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the TalentFlow workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all TalentFlow workspace
//! members:
//!
//! - **Error Handling**: the shared [`TalentError`] type and result alias
//! - **Logging**: `tracing`-based logging bootstrap with env configuration
//! - **Signatures**: stable header-set fingerprinting for mapping cache keys
//!
//! # Example
//!
//! ```no_run
//! use talentflow_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("application started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod signature;

// Re-export commonly used types
pub use error::{Result, TalentError};
pub use signature::header_signature;
