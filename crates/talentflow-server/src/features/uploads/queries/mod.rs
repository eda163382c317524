//! Upload queries

pub mod get_status;
pub mod list_uploads;

pub use get_status::{GetUploadStatusError, GetUploadStatusQuery, UploadStatusResponse};
pub use list_uploads::{ListUploadsError, ListUploadsQuery, ListUploadsResponse};
