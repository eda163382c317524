pub mod suggest;

pub use suggest::{SuggestMappingCommand, SuggestMappingError, SuggestMappingResponse};
