pub mod get;
pub mod list;

pub use get::{GetCandidateError, GetCandidateQuery};
pub use list::{ListCandidatesError, ListCandidatesQuery, ListCandidatesResponse};
