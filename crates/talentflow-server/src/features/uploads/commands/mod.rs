//! Upload commands

pub mod confirm_mapping;
pub mod submit;

pub use confirm_mapping::{ConfirmMappingCommand, ConfirmMappingError, ConfirmMappingResponse};
pub use submit::{SubmitUploadCommand, SubmitUploadError, SubmitUploadResponse};
