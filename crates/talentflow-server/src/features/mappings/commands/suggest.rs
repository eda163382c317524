//! Suggest mapping command
//!
//! Dry-run resolution for a header list the client already has in hand,
//! without creating a job. Runs the same cache/heuristic/oracle chain the
//! upload path uses, so a suggestion here is exactly what a subsequent
//! upload would resolve to.

use std::collections::BTreeMap;

use mediator::Request;
use serde::{Deserialize, Serialize};
use talentflow_ingest::mapping::CanonicalField;

use crate::ingest::{MappingOutcome, MappingResolver};
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestMappingCommand {
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestMappingResponse {
    pub mapping: BTreeMap<String, Option<CanonicalField>>,
    /// True when nothing could be mapped and the client should collect
    /// explicit choices.
    pub needs_manual: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SuggestMappingError {
    #[error("headers list is empty")]
    NoHeaders,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<SuggestMappingResponse, SuggestMappingError>> for SuggestMappingCommand {}

pub async fn handle(
    resolver: &MappingResolver,
    command: SuggestMappingCommand,
) -> Result<SuggestMappingResponse, SuggestMappingError> {
    if command.headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SuggestMappingError::NoHeaders);
    }

    match resolver.resolve(&command.headers).await? {
        MappingOutcome::Resolved(stored) => Ok(SuggestMappingResponse {
            mapping: stored.mapping,
            needs_manual: false,
        }),
        MappingOutcome::NeedsManualMapping { headers } => Ok(SuggestMappingResponse {
            mapping: headers.into_iter().map(|h| (h, None)).collect(),
            needs_manual: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::Stores;

    fn resolver() -> MappingResolver {
        let stores = Stores::in_memory();
        MappingResolver::new(stores.mappings.clone(), None)
    }

    #[tokio::test]
    async fn test_resolvable_headers_suggested() {
        let resolver = resolver();
        let response = handle(
            &resolver,
            SuggestMappingCommand {
                headers: vec!["Email Address".to_string(), "Mystery".to_string()],
            },
        )
        .await
        .unwrap();

        assert!(!response.needs_manual);
        assert_eq!(
            response.mapping["Email Address"],
            Some(CanonicalField::Email)
        );
        assert_eq!(response.mapping["Mystery"], None);
    }

    #[tokio::test]
    async fn test_unmappable_headers_flagged_manual() {
        let resolver = resolver();
        let response = handle(
            &resolver,
            SuggestMappingCommand {
                headers: vec!["Col A".to_string()],
            },
        )
        .await
        .unwrap();
        assert!(response.needs_manual);
        assert_eq!(response.mapping["Col A"], None);
    }

    #[tokio::test]
    async fn test_empty_headers_rejected() {
        let resolver = resolver();
        let err = handle(
            &resolver,
            SuggestMappingCommand {
                headers: vec!["  ".to_string()],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SuggestMappingError::NoHeaders));
    }
}
